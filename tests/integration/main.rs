//! Integration tests against a live PostgreSQL instance.
//!
//! Every test is gated on `KHIDMA_TEST_DATABASE_URL`; without it the
//! tests return immediately so the suite stays green on machines
//! without a database.

mod helpers;
mod presence_test;
