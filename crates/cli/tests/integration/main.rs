mod common;
mod discover_tests;
mod generate_tests;
mod init_tests;
