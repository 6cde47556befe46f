// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runnable demos for the kinetree crates. See the `examples/` directory.
