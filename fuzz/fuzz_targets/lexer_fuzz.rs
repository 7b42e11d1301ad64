//! Fuzz test for the AgentSpec DSL lexer
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use agentspec_dsl::{Lexer, TokenKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();

        assert!(!tokens.is_empty(), "tokenization should produce at least Eof");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof, "last token should always be Eof");

        for token in &tokens {
            assert!(token.span.start <= token.span.end, "span start should be <= end");
            assert!(token.span.line >= 1, "line numbers should be >= 1");
            assert!(token.span.column >= 1, "column numbers should be >= 1");
        }
    }
});
