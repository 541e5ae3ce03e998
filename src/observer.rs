//! MQTT event observation.
//!
//! The daemon reports some state changes asynchronously over the message
//! bus instead of exposing them through a queryable interface. This module
//! waits for such an event: subscribe, fire the action expected to produce
//! it, then drain the connection until a matching message arrives or the
//! deadline elapses.

use anyhow::{Context, Result};
use log::{debug, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

const EVENT_LOOP_CAPACITY: usize = 16;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
/// Upper bound on a single event-loop pump so the overall deadline is
/// re-checked at a reasonable cadence.
const RECEIVE_SLICE: Duration = Duration::from_millis(500);

/// Network location of the MQTT broker mediating between the daemon and
/// external observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Subscribes to `topic`, runs `trigger`, and waits up to `timeout` for a
/// message accepted by `matcher`.
///
/// The matcher inspects each parsed payload and returns the relevant
/// sub-structure on a match, or `None` to keep waiting. Returning the
/// extraction directly (instead of mutating shared state from a delivery
/// callback) means an empty-but-present extraction such as `json!({})` is
/// still a match, distinct from the `Ok(None)` timeout outcome.
///
/// Ordering guarantees:
/// - The subscription is acknowledged by the broker (SUBACK) before
///   `trigger` runs. A message published before the subscription is
///   registered is permanently missed, so triggering earlier would make
///   the result depend on scheduling luck.
/// - The connection is exclusively owned by this call and torn down on
///   every exit path; it is never reused across calls.
///
/// Error policy: broker connection failures and `trigger` failures are
/// fatal and propagate. Malformed (non-JSON) payloads on the topic are
/// logged and skipped; the wait continues until deadline or a match.
pub async fn wait_for_message<M, T, Fut>(
    broker: &BrokerAddress,
    topic: &str,
    matcher: M,
    trigger: T,
    timeout: Duration,
) -> Result<Option<Value>>
where
    M: Fn(&Value) -> Option<Value>,
    T: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let client_id = format!("ygg-observer-{}", Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, broker.host.as_str(), broker.port);
    options.set_keep_alive(KEEP_ALIVE);
    let (client, mut event_loop) = AsyncClient::new(options, EVENT_LOOP_CAPACITY);

    client
        .subscribe(topic, QoS::AtLeastOnce)
        .await
        .with_context(|| format!("failed to request subscription to '{topic}'"))?;

    // Pump the connection until the broker acknowledges the subscription.
    let ack_deadline = Instant::now() + timeout;
    loop {
        let remaining = ack_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let _ = client.try_disconnect();
            return Err(anyhow::anyhow!(
                "broker {}:{} did not acknowledge subscription to '{topic}' within {timeout:?}",
                broker.host,
                broker.port
            ));
        }
        match tokio::time::timeout(remaining, event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::SubAck(_)))) => break,
            Ok(Ok(event)) => debug!("event before subscription ack: {event:?}"),
            Ok(Err(err)) => {
                return Err(err).with_context(|| {
                    format!("connection to broker {}:{} failed", broker.host, broker.port)
                });
            }
            Err(_elapsed) => {
                let _ = client.try_disconnect();
                return Err(anyhow::anyhow!(
                    "broker {}:{} did not acknowledge subscription to '{topic}' within {timeout:?}",
                    broker.host,
                    broker.port
                ));
            }
        }
    }

    debug!("subscribed to '{topic}', invoking trigger action");
    if let Err(err) = trigger().await {
        shutdown(&client, &mut event_loop).await;
        return Err(err.context("trigger action failed"));
    }

    let deadline = Instant::now() + timeout;
    let matched = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break None;
        }
        match tokio::time::timeout(remaining.min(RECEIVE_SLICE), event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                match serde_json::from_slice::<Value>(&publish.payload) {
                    Ok(payload) => {
                        if let Some(extracted) = matcher(&payload) {
                            break Some(extracted);
                        }
                        debug!("message on '{}' did not match, still waiting", publish.topic);
                    }
                    Err(err) => {
                        warn!("ignoring malformed payload on '{}': {err}", publish.topic);
                    }
                }
            }
            Ok(Ok(_event)) => {}
            Ok(Err(err)) => {
                shutdown(&client, &mut event_loop).await;
                return Err(err).with_context(|| {
                    format!("connection to broker {}:{} failed", broker.host, broker.port)
                });
            }
            // Slice elapsed without traffic; the deadline is re-checked at
            // the top of the loop.
            Err(_elapsed) => {}
        }
    };

    shutdown(&client, &mut event_loop).await;
    Ok(matched)
}

/// Requests a clean disconnect and gives the event loop one bounded pump
/// to flush it. Dropping the event loop closes the socket either way, so
/// no handle outlives the call.
async fn shutdown(client: &AsyncClient, event_loop: &mut rumqttc::EventLoop) {
    if client.try_disconnect().is_ok() {
        let _ = tokio::time::timeout(Duration::from_millis(100), event_loop.poll()).await;
    }
}

/// Matcher for the daemon's connection-status publication.
///
/// Accepts payloads with `type == "connection-status"` whose
/// `content.canonical_facts` is a present, non-empty mapping, and extracts
/// that mapping.
pub fn connection_status_facts(payload: &Value) -> Option<Value> {
    if payload.get("type").and_then(Value::as_str) != Some("connection-status") {
        return None;
    }
    let facts = payload.get("content")?.get("canonical_facts")?;
    match facts.as_object() {
        Some(map) if !map.is_empty() => Some(facts.clone()),
        _ => None,
    }
}
