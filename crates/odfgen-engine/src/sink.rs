//! Completion sink - the queue finished jobs are delivered to.

use futures::Stream;
use odfgen_core::Job;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Receives every job of a batch exactly once, in completion order.
///
/// Capacity equals the batch size, so a finishing job never waits for the
/// consumer. The sink ends after `expected` jobs have been popped.
#[derive(Debug)]
pub struct CompletionSink {
    receiver: mpsc::Receiver<Job>,
    expected: usize,
    received: usize,
}

impl CompletionSink {
    /// Create a sink for `expected` jobs and the sender producers push into.
    pub fn channel(expected: usize) -> (mpsc::Sender<Job>, Self) {
        let (sender, receiver) = mpsc::channel(expected.max(1));
        (
            sender,
            Self {
                receiver,
                expected,
                received: 0,
            },
        )
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Jobs not yet popped.
    pub fn remaining(&self) -> usize {
        self.expected - self.received
    }

    /// Jobs finished and waiting to be popped.
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_drained(&self) -> bool {
        self.received >= self.expected
    }

    /// Wait for the next finished job. `None` once every job was popped, or
    /// if all producers went away early.
    pub async fn pop(&mut self) -> Option<Job> {
        if self.is_drained() {
            return None;
        }
        let job = self.receiver.recv().await?;
        self.received += 1;
        Some(job)
    }

    /// Pop until the batch is drained.
    pub async fn drain(mut self) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(self.remaining());
        while let Some(job) = self.pop().await {
            jobs.push(job);
        }
        jobs
    }
}

impl Stream for CompletionSink {
    type Item = Job;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_drained() {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(job)) => {
                this.received += 1;
                Poll::Ready(Some(job))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}
