//! Engine-level test suite: shared builders, replay determinism, and
//! end-to-end tick scenarios.

mod helpers;

mod scenarios;
