//! Handoff between the gateway task and the radio driver task.
//!
//! The two tasks talk over a pair of bounded channels, one each way. Both
//! sides must keep consuming while they wait to produce, or a full channel
//! in each direction stalls them for good:
//!
//! - [`send_draining`]: the gateway pushes a request while it keeps
//!   taking the driver's reports into a local backlog.
//! - [`pump_while`]: the driver performs requests while the link's
//!   notification pump keeps running.

use core::future::Future;
use core::ops::ControlFlow;
use core::pin::pin;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Receiver, Sender};
use heapless::Deque;

/// Send `item` on `to`, moving whatever arrives on `from` into `backlog`
/// until the send completes.
///
/// Once `backlog` is full it stops draining and just waits on the send.
pub async fn send_draining<M, T, R, const NT: usize, const NR: usize, const NB: usize>(
    to: Sender<'_, M, T, NT>,
    item: T,
    from: Receiver<'_, M, R, NR>,
    backlog: &mut Deque<R, NB>,
) where
    M: RawMutex,
{
    let mut send = pin!(to.send(item));
    while !backlog.is_full() {
        match select(send.as_mut(), from.receive()).await {
            Either::First(()) => return,
            Either::Second(report) => {
                // Only reached while there is room.
                let _ = backlog.push_back(report);
            }
        }
    }
    warn!("report backlog full - waiting on the request queue");
    send.await;
}

/// Run `pump` and, alongside it, hand every request from `requests` to
/// `perform` until one of them breaks.
///
/// Returns `First` with the pump's output if the pump ends first, or
/// `Second` with the value `perform` broke with.
pub async fn pump_while<P, M, T, F, Fut, B, const N: usize>(
    pump: P,
    requests: Receiver<'_, M, T, N>,
    mut perform: F,
) -> Either<P::Output, B>
where
    P: Future,
    M: RawMutex,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ControlFlow<B>>,
{
    let control = async {
        loop {
            let request = requests.receive().await;
            if let ControlFlow::Break(exit) = perform(request).await {
                break exit;
            }
        }
    };
    select(pump, control).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::vec::Vec;

    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::channel::Channel;

    // ════════════════════════════════════════════════════════════════════
    // send_draining
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn send_completes_while_the_other_side_is_blocked_reporting() {
        let requests: Channel<NoopRawMutex, u8, 1> = Channel::new();
        let reports: Channel<NoopRawMutex, u8, 1> = Channel::new();
        let mut backlog: Deque<u8, 4> = Deque::new();

        // The request queue is already full.
        requests.try_send(1).unwrap();

        let gateway = send_draining(
            requests.sender(),
            2,
            reports.receiver(),
            &mut backlog,
        );
        // The driver has three reports to hand over before it takes the
        // next request; the report channel only holds one.
        let driver = async {
            for report in [10, 11, 12] {
                reports.send(report).await;
            }
            assert_eq!(requests.receive().await, 1);
            assert_eq!(requests.receive().await, 2);
        };
        block_on(join(gateway, driver));

        // Nothing was lost: what the gateway drained plus what is still
        // queued is every report, in order.
        let mut delivered: Vec<u8> = backlog.iter().copied().collect();
        assert!(!delivered.is_empty());
        while let Ok(report) = reports.try_receive() {
            delivered.push(report);
        }
        assert_eq!(delivered, [10, 11, 12]);
    }

    #[test]
    fn send_with_room_leaves_backlog_empty() {
        let requests: Channel<NoopRawMutex, u8, 2> = Channel::new();
        let reports: Channel<NoopRawMutex, u8, 2> = Channel::new();
        let mut backlog: Deque<u8, 4> = Deque::new();

        block_on(send_draining(
            requests.sender(),
            7,
            reports.receiver(),
            &mut backlog,
        ));

        assert_eq!(requests.try_receive().ok(), Some(7));
        assert!(backlog.is_empty());
    }

    // ════════════════════════════════════════════════════════════════════
    // pump_while
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn pump_keeps_running_while_a_request_is_in_flight() {
        let notifications: Channel<NoopRawMutex, u8, 4> = Channel::new();
        let requests: Channel<NoopRawMutex, u8, 2> = Channel::new();
        let write_done: Channel<NoopRawMutex, (), 1> = Channel::new();
        let seen = RefCell::new(Vec::new());

        // Ends when the "link" closes (notification 0).
        let pump = async {
            loop {
                let n = notifications.receive().await;
                if n == 0 {
                    break;
                }
                seen.borrow_mut().push(n);
            }
        };
        let write_done_rx = &write_done;
        let link = pump_while(pump, requests.receiver(), move |_request: u8| async move {
            write_done_rx.receive().await;
            ControlFlow::<()>::Continue(())
        });

        let peer = async {
            requests.send(1).await;
            yield_now().await;
            // The write is now in flight; notifications keep arriving.
            notifications.send(7).await;
            notifications.send(8).await;
            for _ in 0..4 {
                yield_now().await;
            }
            assert_eq!(*seen.borrow(), [7, 8]);

            write_done.send(()).await;
            notifications.send(0).await;
        };

        let (outcome, ()) = block_on(join(link, peer));
        assert!(matches!(outcome, Either::First(())));
    }

    #[test]
    fn break_from_perform_ends_the_pump() {
        let requests: Channel<NoopRawMutex, u8, 2> = Channel::new();
        requests.try_send(1).unwrap();
        requests.try_send(9).unwrap();

        let mut performed = Vec::new();
        let outcome = block_on(pump_while(
            core::future::pending::<()>(),
            requests.receiver(),
            |request: u8| {
                performed.push(request);
                async move {
                    if request == 9 {
                        ControlFlow::Break(request)
                    } else {
                        ControlFlow::Continue(())
                    }
                }
            },
        ));

        assert!(matches!(outcome, Either::Second(9)));
        assert_eq!(performed, [1, 9]);
    }
}
