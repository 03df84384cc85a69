// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; nothing is collected unless the host
//! installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all memory engine metric descriptions.
pub fn register_metrics() {
    describe_counter!("kindred_turns_total", "Turns processed by the memory engine");
    describe_counter!(
        "kindred_distillations_total",
        "Distillation attempts by outcome"
    );
    describe_gauge!(
        "kindred_ltm_memories",
        "Long-term memories held for the most recently saved user"
    );
    describe_histogram!(
        "kindred_reply_latency_seconds",
        "Model latency for reply generation in seconds"
    );
}

pub fn record_turn(path: &'static str) {
    metrics::counter!("kindred_turns_total", "path" => path).increment(1);
}

/// Record the outcome of one distillation attempt.
pub fn record_distillation(outcome: &'static str) {
    metrics::counter!("kindred_distillations_total", "outcome" => outcome).increment(1);
}

pub fn set_ltm_size(count: usize) {
    metrics::gauge!("kindred_ltm_memories").set(count as f64);
}

pub fn record_reply_latency(seconds: f64) {
    metrics::histogram!("kindred_reply_latency_seconds").record(seconds);
}
