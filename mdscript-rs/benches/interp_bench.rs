use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdscript::host::{self, HostOptions, SharedHost};
use mdscript::script::{Interpreter, Script};

/// A document-sized program: many small functions calling one another,
/// one of them reaching the async clipboard capability.
fn make_program(functions: usize) -> String {
    let mut src = String::from("function copy(t): windowClipboardWrite(t) endfunction\n");
    for i in 0..functions {
        let callee = if i == 0 { "copy".to_owned() } else { format!("f{}", i - 1) };
        src.push_str(&format!(
            "function f{i}(n):\n    if n > 0:\n        {callee}(n - 1)\n    endif\n    return n * 2\nendfunction\n"
        ));
    }
    src
}

const LOOP: &str = "\
function fib(n):
    if n < 2:
        return n
    endif
    return fib(n - 1) + fib(n - 2)
endfunction
total = 0
i = 0
while i < 200:
    total = total + i % 7
    i = i + 1
endwhile
x = fib(15)
";

fn bench_load(c: &mut Criterion) {
    let state = SharedHost::default();
    let caps = host::standard(&state, &HostOptions::default());
    let src = make_program(200);

    let mut g = c.benchmark_group("load");
    g.bench_function("parse_and_analyze_200_functions", |b| {
        b.iter(|| Script::load(black_box(&src), &caps))
    });
    g.finish();
}

fn bench_eval(c: &mut Criterion) {
    let state = SharedHost::default();
    let mut interp = Interpreter::new(host::standard(&state, &HostOptions::default()));
    let script = match interp.load(LOOP) {
        Ok(script) => script,
        Err(e) => panic!("benchmark program failed to load: {e}"),
    };

    let mut g = c.benchmark_group("eval");
    g.bench_function("loop_and_recursion", |b| {
        b.iter(|| interp.run_sync(black_box(&script)))
    });
    g.finish();
}

criterion_group!(benches, bench_load, bench_eval);
criterion_main!(benches);
