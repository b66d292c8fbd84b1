// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict API endpoint module
//!
//! Provides POST /predict for counting people in an uploaded, linked or
//! inline image.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::predict_handler;
pub use request::PredictJsonRequest;
pub use response::PredictResponse;
