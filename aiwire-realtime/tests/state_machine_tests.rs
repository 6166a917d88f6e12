//! Property tests for the connection state machine.

mod common;

use aiwire_realtime::{
    AtomicConnectivityState, ClientEvent, CloseReason, ConnectivityState, RealtimeError,
};
use common::{MockTransport, OpenBehavior, session_with};
use proptest::prelude::*;
use std::sync::Arc;

use ConnectivityState::*;

fn any_state() -> impl Strategy<Value = ConnectivityState> {
    prop::sample::select(ConnectivityState::ALL.to_vec())
}

/// Operations a caller or the transport can perform on a session.
#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Accept,
    Fail,
    PeerClose,
    Stop,
    Send,
    Close,
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Start),
        3 => Just(Op::Accept),
        1 => Just(Op::Fail),
        1 => Just(Op::PeerClose),
        2 => Just(Op::Stop),
        4 => Just(Op::Send),
        1 => Just(Op::Close),
    ]
}

proptest! {
    #[test]
    fn prop_transition_from_only_follows_the_expected_set(
        initial in any_state(),
        expected in prop::collection::vec(any_state(), 0..4),
        target in any_state(),
    ) {
        let state = AtomicConnectivityState::new(initial);
        match state.transition_from(&expected, target) {
            Ok(previous) => {
                prop_assert_eq!(previous, initial);
                prop_assert!(expected.contains(&initial));
                prop_assert_eq!(state.load(), target);
            }
            Err(observed) => {
                prop_assert_eq!(observed, initial);
                prop_assert!(!expected.contains(&initial));
                prop_assert_eq!(state.load(), initial);
            }
        }
    }

    #[test]
    fn prop_closed_is_absorbing(next in any_state()) {
        prop_assert!(!Closed.can_transition_to(next));
        let state = AtomicConnectivityState::new(Closed);
        prop_assert_eq!(state.close(), Closed);
        prop_assert_eq!(state.load(), Closed);
    }

    #[test]
    fn prop_session_honours_the_lifecycle(ops in prop::collection::vec(any_op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let transport = MockTransport::new(OpenBehavior::Hold);
            let (session, _events) = session_with(transport.clone());
            let mut opened = false;
            let mut sends = 0;

            for op in ops {
                let before = session.state();
                match op {
                    Op::Start => {
                        let result = session.start();
                        prop_assert_eq!(result.is_ok(), before.can_start());
                        if result.is_ok() {
                            transport.wait_for_opens(transport.opens() + 1).await;
                            opened = true;
                        } else if before == Closed {
                            prop_assert!(matches!(result, Err(RealtimeError::SessionClosed)));
                        }
                    }
                    Op::Accept if opened => transport.accept().await,
                    Op::Fail if opened => transport.fail("boom").await,
                    Op::PeerClose if opened => transport.peer_close(CloseReason::normal()).await,
                    Op::Stop => {
                        let result = session.stop().await;
                        prop_assert_eq!(result.is_ok(), before == Connected);
                    }
                    Op::Send => {
                        let result = session.send(&ClientEvent::commit_audio()).await;
                        prop_assert_eq!(result.is_ok(), before == Connected);
                        if result.is_ok() {
                            sends += 1;
                        }
                    }
                    Op::Close => session.close().await.unwrap(),
                    _ => {}
                }

                let after = session.state();
                prop_assert!(
                    after == before || before.can_transition_to(after),
                    "{:?}: {} -> {}", op, before, after
                );
                prop_assert_eq!(transport.sent().len(), sends);
            }

            session.close().await.unwrap();
            prop_assert_eq!(session.state(), Closed);
            Ok(())
        })?;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_lifecycle_ends_closed() {
    for _ in 0..20 {
        let transport = MockTransport::new(OpenBehavior::Accept);
        let (session, _events) = session_with(transport.clone());
        let session = Arc::new(session);

        let mut tasks = Vec::new();
        for worker in 0..8 {
            let session = session.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..10 {
                    match (worker + round) % 4 {
                        0 => {
                            let _ = session.start();
                        }
                        1 => {
                            let _ = session.stop().await;
                        }
                        2 => {
                            let _ = session.send(&ClientEvent::clear_audio()).await;
                        }
                        _ if worker == 7 && round == 9 => session.close().await.unwrap(),
                        _ => tokio::task::yield_now().await,
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        session.close().await.unwrap();
        assert_eq!(session.state(), Closed);
        assert!(matches!(session.start(), Err(RealtimeError::SessionClosed)));
    }
}
