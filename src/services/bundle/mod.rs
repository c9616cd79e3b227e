// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod liquidity;
pub mod pipeline;
pub mod sequencer;
pub mod signing;
pub mod submission;
