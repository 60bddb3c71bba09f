mod common;
mod replay_tests;
