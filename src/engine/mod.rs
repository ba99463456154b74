//! Pure scoring pipeline: no I/O, no clocks, no locks.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  BallInput   │────►│  normalize   │────►│  BallEvent   │
//! │  (raw JSON)  │     │  (validate)  │     │ (canonical)  │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                  │
//!                  ┌───────────────────────┬───────┴──────────────┐
//!                  ▼                       ▼                      ▼
//!          ┌──────────────┐        ┌──────────────┐       ┌──────────────┐
//!          │   reducer    │        │    ledger    │       │     live     │
//!          │ (innings)    │        │ (bat / bowl) │       │  (snapshot)  │
//!          └──────────────┘        └──────────────┘       └──────────────┘
//! ```
//!
//! Every forward step has an exact inverse (`revert_*`) so an undo can take a
//! single delivery back out without replaying the innings.

pub mod events;
pub mod ledger;
pub mod live;
pub mod normalize;
pub mod reducer;
pub mod state;
