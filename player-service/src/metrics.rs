// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub use prometheus::TEXT_FORMAT as CONTENT_TYPE;

const THROW_BUCKETS: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

/// Process-wide metrics registry, built once in `main` and shared through `AppState`.
pub struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    throw_values: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("morra_http_request_count", "HTTP requests served by the player"),
            &["method", "path", "status_code"],
        )
        .context("failed to create request counter")?;
        registry
            .register(Box::new(http_requests.clone()))
            .context("failed to register request counter")?;

        let throw_values = Histogram::with_opts(
            HistogramOpts::new("morra_throw_value", "Throws made by the player")
                .buckets(THROW_BUCKETS.to_vec()),
        )
        .context("failed to create throw histogram")?;
        registry
            .register(Box::new(throw_values.clone()))
            .context("failed to register throw histogram")?;

        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))
            .context("failed to register process collector")?;

        Ok(Self {
            registry,
            http_requests,
            throw_values,
        })
    }

    pub fn observe_request(&self, method: &str, path: &str, status_code: u16) {
        let status_code = status_code.to_string();
        self.http_requests
            .with_label_values(&[method, path, status_code.as_str()])
            .inc();
    }

    pub fn observe_throw(&self, throw_value: u32) {
        self.throw_values.observe(f64::from(throw_value));
    }

    /// Encode every registered family in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output was not utf-8")
    }
}
