use agentspec_dsl::ir::lower;
use agentspec_dsl::lexer::Lexer;
use agentspec_dsl::parser::Parser;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SOURCE: &str = r#"
package "acme" version "1.0.0"

prompt "support-system" {
    content "You are a helpful support agent."
}

agent "support-bot" {
    model "claude-sonnet-4"
    uses prompt "support-system"
}

server "search-mcp" {
    command "npx"
    args ["-y", "@acme/search-mcp"]
}

agent "research-bot" {
    model "claude-opus-4"
    connects to server "search-mcp"
}

pipeline "onboarding" {
    step "greet" { delegate to agent "support-bot" }
    step "research" { delegate to agent "research-bot" depends_on ["greet"] }
}
"#;

fn lex_and_parse(source: &str) {
    let tokens = Lexer::new(source).tokenize();
    let (file, errors) = Parser::new(tokens, "bench.ias").parse();
    black_box(&errors);
    black_box(lower(&[file]).unwrap());
}

fn bench_lex_parse_lower(c: &mut Criterion) {
    c.bench_function("lex_parse_lower_small_package", |b| {
        b.iter(|| lex_and_parse(black_box(SOURCE)))
    });
}

criterion_group!(benches, bench_lex_parse_lower);
criterion_main!(benches);
