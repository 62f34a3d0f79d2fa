//! Request/response correlation over unreliable datagram transports
//!
//! A request is sent, then replies are collected until either the expected number of distinct
//! replies has been received or the attempt times out, in which case the request is sent again.
//! Replies are deduplicated using their [Correlate::correlation_key], so a reply to a
//! retransmission is not counted twice.

use std::{collections::HashSet, fmt, hash::Hash, io, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};

/// Number of distinct replies after which a request is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedResponses {
    Count(usize),
    /// Keep listening until every attempt has timed out
    Unbounded,
}

impl ExpectedResponses {
    fn is_satisfied(&self, received: usize) -> bool {
        match self {
            Self::Count(count) => received >= *count,
            Self::Unbounded => false,
        }
    }
}

/// Parameters of a request/response exchange
pub trait RetryPolicy<R>: Send {
    /// Number of times the request is sent at most
    ///
    /// The request is always sent at least once: 0 counts as 1.
    fn attempts(&self) -> u32;

    /// How long to listen for replies after sending attempt `attempt` (starting at 0)
    fn timeout(&self, attempt: u32) -> Duration;

    fn expected_responses(&self) -> ExpectedResponses;

    /// Called once for every distinct reply, as soon as it is received
    fn on_response(&mut self, _response: &R) {}
}

/// Replies which can be told apart from retransmitted copies
pub trait Correlate {
    type Key: Eq + Hash + Send;

    fn correlation_key(&self) -> Self::Key;
}

/// Datagram transport carrying requests and their replies
#[async_trait]
pub trait Transport: Send {
    type Request: Sync;
    type Response: Send;

    async fn send(&mut self, request: &Self::Request) -> io::Result<()>;

    /// Wait for the next reply to `request`, discarding unrelated datagrams
    ///
    /// This must be cancel-safe: it may be dropped at any time when an attempt times out.
    async fn recv(&mut self, request: &Self::Request) -> io::Result<Self::Response>;
}

/// Transport failure, along with the replies received before it happened
#[derive(Error)]
#[error("transport failure after {} response(s): {source}", .partial.len())]
pub struct RetryError<R> {
    #[source]
    pub source: io::Error,
    pub partial: Vec<R>,
}

impl<R> fmt::Debug for RetryError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryError")
            .field("source", &self.source)
            .field("partial", &self.partial.len())
            .finish()
    }
}

/// Deadline for timeouts too long to be represented, about 30 years ahead
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

/// Send `request` and collect the distinct replies according to `policy`
///
/// Returns the replies received so far when the expected count is not reached after the last
/// attempt; an empty result is not an error at this level.
#[instrument(level = "trace", skip_all)]
pub async fn execute<T, P>(
    transport: &mut T,
    request: &T::Request,
    policy: &mut P,
) -> Result<Vec<T::Response>, RetryError<T::Response>>
where
    T: Transport,
    T::Response: Correlate,
    P: RetryPolicy<T::Response>,
{
    let expected = policy.expected_responses();
    let mut seen = HashSet::new();
    let mut responses = Vec::new();

    for attempt in 0..policy.attempts().max(1) {
        if let Err(source) = transport.send(request).await {
            return Err(RetryError {
                source,
                partial: responses,
            });
        }

        if expected.is_satisfied(responses.len()) {
            return Ok(responses);
        }

        let deadline = Instant::now()
            .checked_add(policy.timeout(attempt))
            .unwrap_or_else(far_future);

        loop {
            match timeout_at(deadline, transport.recv(request)).await {
                Err(_) => break,
                Ok(Err(source)) => {
                    return Err(RetryError {
                        source,
                        partial: responses,
                    });
                }
                Ok(Ok(response)) => {
                    if !seen.insert(response.correlation_key()) {
                        trace!(attempt, "duplicate response");
                        continue;
                    }

                    policy.on_response(&response);
                    responses.push(response);

                    if expected.is_satisfied(responses.len()) {
                        return Ok(responses);
                    }
                }
            }
        }

        debug!(attempt, received = responses.len(), "attempt timed out");
    }

    Ok(responses)
}

/// Retry parameters of unicast requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_millis(500),
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetrySettings {
    pub fn policy<R>(&self, expected: ExpectedResponses) -> BasicRetryPolicy<R> {
        BasicRetryPolicy::new(self.attempts, self.timeout, expected).with_backoff(self.backoff)
    }
}

/// Callback invoked for each distinct reply
pub type ResponseCallback<R> = Box<dyn FnMut(&R) + Send>;

/// Fixed number of attempts with a linearly growing timeout
pub struct BasicRetryPolicy<R> {
    pub attempts: u32,
    /// Timeout of the first attempt
    pub timeout: Duration,
    /// Added to the timeout on every further attempt
    pub backoff: Duration,
    pub expected: ExpectedResponses,
    callback: Option<ResponseCallback<R>>,
}

impl<R> BasicRetryPolicy<R> {
    pub fn new(attempts: u32, timeout: Duration, expected: ExpectedResponses) -> Self {
        Self {
            attempts,
            timeout,
            backoff: Duration::ZERO,
            expected,
            callback: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_callback(mut self, callback: impl FnMut(&R) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<R> fmt::Debug for BasicRetryPolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicRetryPolicy")
            .field("attempts", &self.attempts)
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .field("expected", &self.expected)
            .finish()
    }
}

impl<R> RetryPolicy<R> for BasicRetryPolicy<R> {
    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn timeout(&self, attempt: u32) -> Duration {
        self.timeout.saturating_add(self.backoff.saturating_mul(attempt))
    }

    fn expected_responses(&self) -> ExpectedResponses {
        self.expected
    }

    fn on_response(&mut self, response: &R) {
        if let Some(callback) = self.callback.as_mut() {
            callback(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use tokio::time::sleep_until;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Reply {
        device: u32,
        part: u32,
    }

    impl Correlate for Reply {
        type Key = (u32, u32);

        fn correlation_key(&self) -> Self::Key {
            (self.device, self.part)
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Event {
        Reply(Reply),
        Fail,
    }

    /// Transport replaying a fixed script: `script[n]` lists the events following send `n`
    struct ScriptedTransport {
        script: Vec<Vec<(u64, Event)>>,
        queue: VecDeque<(Instant, Event)>,
        sends: usize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Vec<(u64, Event)>>) -> Self {
            Self {
                script,
                queue: VecDeque::new(),
                sends: 0,
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        type Request = ();
        type Response = Reply;

        async fn send(&mut self, _request: &()) -> io::Result<()> {
            let now = Instant::now();
            if let Some(events) = self.script.get(self.sends) {
                self.queue.extend(
                    events
                        .iter()
                        .map(|(delay, event)| (now + Duration::from_millis(*delay), *event)),
                );
                self.queue.make_contiguous().sort_by_key(|(at, _)| *at);
            }

            self.sends += 1;
            Ok(())
        }

        async fn recv(&mut self, _request: &()) -> io::Result<Reply> {
            let at = match self.queue.front() {
                Some((at, _)) => *at,
                None => futures::future::pending().await,
            };

            sleep_until(at).await;

            match self.queue.pop_front() {
                Some((_, Event::Reply(reply))) => Ok(reply),
                Some((_, Event::Fail)) => Err(io::ErrorKind::ConnectionRefused.into()),
                None => futures::future::pending().await,
            }
        }
    }

    fn reply(device: u32) -> Event {
        Event::Reply(Reply { device, part: 0 })
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_collects_every_device_once() {
        let mut transport = ScriptedTransport::new(vec![
            vec![(10, reply(1)), (20, reply(2))],
            vec![(5, reply(1)), (30, reply(3)), (40, reply(2))],
        ]);
        let mut policy =
            BasicRetryPolicy::new(2, Duration::from_millis(2500), ExpectedResponses::Unbounded);

        let start = Instant::now();
        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        let devices: Vec<_> = responses.iter().map(|r| r.device).collect();
        assert_eq!(devices, vec![1, 2, 3]);
        assert_eq!(transport.sends, 2);
        assert!(start.elapsed() >= Duration::from_millis(5000));
        assert!(start.elapsed() < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_expected_count_is_reached() {
        let mut transport = ScriptedTransport::new(vec![vec![(5, reply(1)), (10, reply(2))]]);
        let mut policy =
            BasicRetryPolicy::new(3, Duration::from_millis(500), ExpectedResponses::Count(1));

        let start = Instant::now();
        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses.len(), 1);
        assert_eq!(transport.sends, 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_a_reply_arrives() {
        let mut transport = ScriptedTransport::new(vec![vec![], vec![], vec![(100, reply(7))]]);
        let mut policy =
            BasicRetryPolicy::new(3, Duration::from_millis(200), ExpectedResponses::Count(1))
                .with_backoff(Duration::from_millis(100));

        let start = Instant::now();
        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses, vec![Reply { device: 7, part: 0 }]);
        assert_eq!(transport.sends, 3);
        // 200ms + 300ms of silence, then the reply
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn short_result_is_not_an_error() {
        let mut transport = ScriptedTransport::new(vec![vec![(1, reply(1))]]);
        let mut policy =
            BasicRetryPolicy::new(2, Duration::from_millis(100), ExpectedResponses::Count(2));

        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses.len(), 1);
        assert_eq!(transport.sends, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_keeps_partial_results() {
        let mut transport = ScriptedTransport::new(vec![vec![(1, reply(1)), (2, Event::Fail)]]);
        let mut policy =
            BasicRetryPolicy::new(1, Duration::from_millis(100), ExpectedResponses::Unbounded);

        let error = execute(&mut transport, &(), &mut policy)
            .await
            .expect_err("transport should fail");

        assert_eq!(error.partial.len(), 1);
        assert_eq!(error.source.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_sends_once() {
        let mut transport = ScriptedTransport::new(vec![vec![(1, reply(1))]]);
        let mut policy =
            BasicRetryPolicy::new(0, Duration::from_millis(100), ExpectedResponses::Count(1));

        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses.len(), 1);
        assert_eq!(transport.sends, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeouts_wait_for_the_reply() {
        let mut transport = ScriptedTransport::new(vec![vec![], vec![(50, reply(4))]]);
        let mut policy = BasicRetryPolicy::new(2, Duration::ZERO, ExpectedResponses::Count(1))
            .with_backoff(Duration::MAX);

        assert_eq!(RetryPolicy::<Reply>::timeout(&policy, 1), Duration::MAX);

        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses, vec![Reply { device: 4, part: 0 }]);
        assert_eq!(transport.sends, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_sees_each_distinct_reply() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut transport = ScriptedTransport::new(vec![
            vec![(1, reply(1))],
            vec![(1, reply(1)), (2, reply(2))],
        ]);
        let mut policy =
            BasicRetryPolicy::new(2, Duration::from_millis(50), ExpectedResponses::Unbounded)
                .with_callback({
                    let calls = calls.clone();
                    move |_: &Reply| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    }
                });

        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn parts_of_one_device_are_distinct() {
        let mut transport = ScriptedTransport::new(vec![vec![
            (1, Event::Reply(Reply { device: 1, part: 0 })),
            (2, Event::Reply(Reply { device: 1, part: 82 })),
        ]]);
        let mut policy =
            BasicRetryPolicy::new(1, Duration::from_millis(50), ExpectedResponses::Count(2));

        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert_eq!(responses.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget_does_not_wait() {
        let mut transport = ScriptedTransport::new(vec![vec![(1, reply(1))]]);
        let mut policy =
            BasicRetryPolicy::new(3, Duration::from_millis(50), ExpectedResponses::Count(0));

        let start = Instant::now();
        let responses = execute(&mut transport, &(), &mut policy)
            .await
            .expect("transport failed");

        assert!(responses.is_empty());
        assert_eq!(transport.sends, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
