//! Property-Based Invariant Testing
//!
//! - Every non-blank line sits at exactly four spaces per open block
//! - Blank lines never carry leading whitespace
//! - Whitespace-equivalent text never triggers a write

mod support;

use codegen_writeback::codegen::equal_ignoring_whitespace;
use codegen_writeback::{EmitBuffer, Outcome, Validator, WriteRequest};
use proptest::prelude::*;
use support::{CountingCheckout, TestWorkspace};

#[derive(Debug, Clone)]
enum Op {
    Begin,
    End,
    Line(String),
    Blank(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Begin),
        2 => Just(Op::End),
        4 => "[a-zA-Z_][a-zA-Z0-9_ =;()]{0,20}".prop_map(Op::Line),
        1 => "[ \t]{0,4}".prop_map(Op::Blank),
    ]
}

proptest! {
    #[test]
    fn indentation_tracks_depth(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut buf = EmitBuffer::new();
        // (leading spaces, trimmed content) expected for each emitted line
        let mut expected: Vec<(usize, String)> = Vec::new();

        for op in &ops {
            match op {
                Op::Begin => {
                    expected.push((buf.depth() * 4, "{".to_string()));
                    buf.begin_block();
                }
                Op::End => {
                    if buf.depth() == 0 {
                        prop_assert!(buf.end_block().is_err());
                        continue;
                    }
                    buf.end_block().unwrap();
                    expected.push((buf.depth() * 4, "}".to_string()));
                }
                Op::Line(text) => {
                    expected.push((buf.depth() * 4, text.clone()));
                    buf.write_line(text);
                }
                Op::Blank(text) => {
                    expected.push((0, String::new()));
                    buf.write_line(text);
                }
            }
        }

        let rendered = buf.render();
        let lines: Vec<&str> = rendered.split_terminator('\n').collect();
        prop_assert_eq!(lines.len(), expected.len());

        for (line, (indent, content)) in lines.iter().zip(&expected) {
            let leading = line.len() - line.trim_start_matches(' ').len();
            prop_assert_eq!(leading, *indent, "line {:?}", line);
            prop_assert_eq!(&line[leading..], content.as_str());
        }
    }

    #[test]
    fn whitespace_equivalence_ignores_inserted_whitespace(
        words in prop::collection::vec("[a-z;{}=]{1,6}", 1..12),
        seps in prop::collection::vec(prop_oneof![Just(" "), Just("\n"), Just("\r\n"), Just("\t"), Just("")], 12),
    ) {
        let compact: String = words.concat();
        let spaced: String = words
            .iter()
            .zip(seps.iter().cycle())
            .map(|(w, s)| format!("{w}{s}"))
            .collect();

        prop_assert!(equal_ignoring_whitespace(&compact, &spaced));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn reformatted_file_is_never_rewritten(body in "[a-z]{1,8}( [a-z]{1,8}){0,5}") {
        let ws = TestWorkspace::new();
        let generated = format!("{{\n    {body};\n}}\n");
        let on_disk = generated.replace('\n', "\r\n").replace("    ", "\t");
        let path = ws.write("Gen.cs", &on_disk);
        let checkout = CountingCheckout::new();

        let outcome = Validator::new(checkout.clone())
            .validate(&WriteRequest::new(generated, &path))
            .unwrap();

        prop_assert_eq!(outcome, Outcome::Unchanged);
        prop_assert_eq!(checkout.calls(), 0);
        prop_assert_eq!(ws.read("Gen.cs"), on_disk);
    }
}
