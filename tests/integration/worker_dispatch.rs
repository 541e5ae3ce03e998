//! Dispatch test: a data message published on the bus is routed to the
//! echo worker, whose unit systemd starts on demand.

use std::time::Duration;

use yggdrasil_integration::poll::{poll_until, PollOutcome};
use yggdrasil_integration::service::{self, ServiceState};
use yggdrasil_integration::test_harness::{broker_reachable, command_available, TestEnvironment};
use yggdrasil_integration::{ECHO_WORKER_UNIT, LOCAL_BROKER_HOST, LOCAL_BROKER_PORT, YGGDRASIL_UNIT};

use crate::integration::daemon_controllable;

const ECHO_DIRECTIVE: &str = "echo";
const ECHO_PAYLOAD: &str = "\"hello\"";

#[tokio::test]
async fn test_echo_worker_started_on_data_message() {
    let _ = env_logger::try_init();
    if !daemon_controllable().await
        || !broker_reachable(LOCAL_BROKER_HOST, LOCAL_BROKER_PORT)
        || !command_available("yggctl")
        || !command_available("mosquitto_pub")
    {
        eprintln!("skipping: daemon, local broker or CLI tooling not available");
        return;
    }

    let env = TestEnvironment::host();

    service::start(YGGDRASIL_UNIT).await.unwrap();
    // Clean slate: the worker must be started by the dispatch, not be
    // running already.
    service::stop(ECHO_WORKER_UNIT).await.unwrap();

    env.publish_data_message(ECHO_DIRECTIVE, ECHO_PAYLOAD)
        .await
        .unwrap();

    // Leave the daemon a moment to consume and route the message.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let outcome = poll_until(
        || async { service::service_state(ECHO_WORKER_UNIT).await },
        |state| *state == ServiceState::Active,
        Duration::from_millis(200),
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        PollOutcome::Satisfied(ServiceState::Active),
        "echo worker was not started by the dispatched message"
    );
}
