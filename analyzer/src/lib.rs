// simtlint — static checks for SIMT kernel sources
//
// Library root. Front end (lexer, parser, resolve), analysis core (taint,
// flatten, the four checks, engine) and run orchestration (driver, report).

pub mod ast;
pub mod backward_branch;
pub mod barrier;
pub mod config;
pub mod diag;
pub mod driver;
pub mod engine;
pub mod flatten;
pub mod id;
pub mod lexer;
pub mod parser;
pub mod recursion;
pub mod report;
pub mod resolve;
pub mod single_work_item;
pub mod source;
pub mod taint;
pub mod walk;
