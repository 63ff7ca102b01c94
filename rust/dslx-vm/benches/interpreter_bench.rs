//! Benchmarks for the interpreter loop: straight-line arithmetic, a
//! backward-jump loop, and recursive compiled calls.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dslx_bytecode::{code_from_string, parse_program};
use dslx_core::Value;
use dslx_vm::{interpret, VM};
use std::sync::Arc;

const STRAIGHT_LINE: &str = "\
000 literal u32:0xa5a5a5a5
001 store 0
002 literal u32:0x5a5a5a5a
003 store 1
004 load 0
005 load 1
006 or
007 load 0
008 sub
009 literal u32:2
010 shll
011 load 1
012 xor";

/// Counts slot 0 up to 1000.
const LOOP: &str = "\
000 literal u32:0
001 store 0
002 jump_dest
003 load 0
004 literal u32:1
005 add
006 store 0
007 load 0
008 literal u32:1000
009 lt
010 jump_rel_if -8
011 load 0";

const RECURSIVE: &str = "\
fn countdown(1) slots=1
000 load 0
001 literal u32:0
002 eq
003 jump_rel_if +6
004 load 0
005 literal u32:1
006 sub
007 call fn:0
008 jump_rel +3
009 jump_dest
010 literal u32:0
011 jump_dest
";

fn bench_straight_line(c: &mut Criterion) {
    let code = code_from_string(STRAIGHT_LINE).expect("benchmark code should load");
    c.bench_function("straight_line", |b| {
        b.iter(|| {
            let mut slots = vec![Value::Unit; 2];
            black_box(interpret(black_box(&code), &mut slots))
        })
    });
}

fn bench_loop(c: &mut Criterion) {
    let code = code_from_string(LOOP).expect("benchmark code should load");
    c.bench_function("loop_1000", |b| {
        b.iter(|| {
            let mut slots = vec![Value::Unit; 1];
            black_box(interpret(black_box(&code), &mut slots))
        })
    });
}

fn bench_recursive_calls(c: &mut Criterion) {
    let program = Arc::new(parse_program(RECURSIVE).expect("benchmark program should parse"));
    let mut vm = VM::new();
    vm.load(program);
    c.bench_function("countdown_200", |b| {
        b.iter(|| black_box(vm.execute("countdown", vec![Value::make_u32(200)])))
    });
}

criterion_group!(benches, bench_straight_line, bench_loop, bench_recursive_calls);
criterion_main!(benches);
