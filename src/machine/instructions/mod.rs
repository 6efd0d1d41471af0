//! Opcode implementations (C9), one module per spec.md §4.6 category.
//! Each file adds an `impl<P: Platform> Machine<P>` block; together with
//! `machine::mod`'s `dispatch`, they form the complete 256-entry table.

mod arithmetic;
mod control;
mod environment;
mod feedback;
mod globals;
mod hood;
mod literals;
mod special_forms;
mod threads;
mod tuple;
