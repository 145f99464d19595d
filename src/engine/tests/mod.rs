//! Engine unit tests

mod scheduler;
