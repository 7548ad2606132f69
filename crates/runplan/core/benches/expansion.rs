// Runplan
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Evaluation and expansion benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use runplan_core::evaluator::{EvalMode, evaluate_globals};
use runplan_core::expansion::{ExpansionConfig, expand_globals};
use runplan_core::{GlobalSpec, GroupGlobals, SequenceGlobals};

/// Two outer axes of `n` points plus a dependent zipped with the first
fn scan(n: usize) -> SequenceGlobals {
    let mut group = GroupGlobals::new();
    group.insert("freq".into(), GlobalSpec::new(format!("linspace(1, 2, {n}) * MHz"), "Hz", "f"));
    group.insert("detuning".into(), GlobalSpec::new("freq - 1.5 * MHz", "Hz", "f"));
    group.insert("delay".into(), GlobalSpec::new(format!("arange({n}) * us"), "s", "outer"));
    group.insert("power".into(), GlobalSpec::new("0.5", "", ""));
    SequenceGlobals::from([("scan".to_string(), group)])
}

fn bench_evaluate(c: &mut Criterion) {
    let sequence = scan(100);
    c.bench_function("evaluate_globals", |b| b.iter(|| evaluate_globals(black_box(&sequence), EvalMode::Strict).unwrap()));
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_globals");
    for n in [10, 100, 300] {
        let sequence = scan(n);
        let evaluation = evaluate_globals(&sequence, EvalMode::Strict).unwrap();
        let config = ExpansionConfig::new();
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| expand_globals(black_box(&sequence), black_box(&evaluation.results), &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_expand);
criterion_main!(benches);
