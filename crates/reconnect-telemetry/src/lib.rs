// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Reconnect Telemetry
//!
//! Append-only sample and note logs with per-log delivery watermarks, and the
//! periodic chunk upload that ships their unsent suffix to the ingestion
//! endpoint. Delivery is at-least-once: a failed upload leaves the
//! watermarks untouched so the next attempt resends the same suffix.

#![warn(missing_docs)]

pub mod http;
pub mod pipeline;
pub mod store;
pub mod upload;

pub use http::{uploader_for, HttpChunkUploader};
pub use pipeline::{FlushOutcome, PipelineConfig, TelemetryPipeline, TickReport};
pub use store::{PendingChunk, TelemetryLog, Watermarks};
pub use upload::{ChunkUploader, LogUploader, UploadError, UploadJob, UploadOutcome, UploadWorker};
