//! End-to-end selection scenarios: server list in, env file out.

mod selection;
