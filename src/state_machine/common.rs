// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Outcome of one state step.
#[derive(Debug)]
pub enum Transition<S> {
    /// Move on (possibly to the same state) and keep running.
    Next(S),
    /// An endpoint is not ready; suspend until the next wake event.
    Stay,
}

pub trait StateMachine<Ctx, Resp> {
    fn step(&self, ctx: &mut Ctx) -> Resp;
}
