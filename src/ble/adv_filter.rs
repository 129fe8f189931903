use crate::config::{DEVICE_ID_LEN, PRODUCT_NAME_PREFIX};
use crate::identity::DeviceId;

/// AD type of the Complete Local Name element.
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// What to do with one advertising report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Not our peripheral.
    Ignore,
    /// No target yet: take this suffix as the target, then connect.
    Adopt(DeviceId),
    /// The suffix matches the current target: connect.
    Connect,
}

/// Find the Complete Local Name element in raw advertisement data.
pub fn complete_local_name(data: &[u8]) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_TYPE_COMPLETE_LOCAL_NAME {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

/// The device suffix of a product name, if the name carries the expected prefix.
pub fn device_suffix(name: &[u8]) -> Option<&[u8]> {
    let rest = name.strip_prefix(PRODUCT_NAME_PREFIX)?;
    rest.get(..DEVICE_ID_LEN)
}

/// Decide whether an advertising report comes from the target peripheral.
pub fn evaluate(data: &[u8], target: Option<DeviceId>) -> Verdict {
    let Some(suffix) = complete_local_name(data).and_then(device_suffix) else {
        return Verdict::Ignore;
    };
    match target {
        Some(id) if id.matches(suffix) => Verdict::Connect,
        Some(_) => Verdict::Ignore,
        None => DeviceId::from_bytes(suffix).map_or(Verdict::Ignore, Verdict::Adopt),
    }
}
