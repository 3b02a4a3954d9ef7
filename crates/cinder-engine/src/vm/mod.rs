// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `loader` - validates bytecode and resolves labels into a decoded program
//! - `interpreter` - the execution engine

mod interpreter;
mod loader;

pub use interpreter::VM;
