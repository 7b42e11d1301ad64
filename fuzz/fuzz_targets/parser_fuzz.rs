//! Fuzz test for the AgentSpec DSL parser
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use agentspec_dsl::{Lexer, Parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();

        let mut parser = Parser::new(tokens, "fuzz.ias");
        let (_file, errors) = parser.parse();

        for error in &errors {
            assert!(error.line >= 1, "error line should be >= 1");
            assert!(error.column >= 1, "error column should be >= 1");
            assert!(!error.message.is_empty(), "error message should not be empty");
        }
    }
});
