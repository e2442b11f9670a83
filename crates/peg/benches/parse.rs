use criterion::{criterion_group, criterion_main, Criterion};

use sprig_peg::{
    choice, chr_range, eoi, lit, one_or_more, parse, seq, start, zero_or_more, Grammar, Rule,
};

fn arithmetic_grammar() -> Grammar {
    let number = Rule::of(one_or_more(chr_range('0', '9'))).unwrap();
    let operator = Rule::of(choice(lit("+"), choice(lit("-"), lit("*")))).unwrap();
    let top = Rule::of(seq(
        seq(number.clone(), zero_or_more(seq(operator.clone(), number.clone()))),
        eoi(),
    ))
    .unwrap();
    start(&top).unwrap()
}

fn arithmetic(c: &mut Criterion) {
    let grammar = arithmetic_grammar();
    let input = {
        let mut text = String::from("1");
        for i in 0..5_000 {
            text.push(['+', '-', '*'][i % 3]);
            text.push_str("1234567890");
        }
        text
    };

    c.bench_function("arithmetic", |b| {
        b.iter(|| {
            assert!(parse(&input, &grammar).unwrap());
        })
    });
}

criterion_group!(benches, arithmetic);
criterion_main!(benches);
