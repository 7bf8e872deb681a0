use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rlnc_mux::gf::field;

fn bench_gmul(c: &mut Criterion) {
    let f = field();
    let a: Vec<u8> = (0..1024).map(|i| i as u8).collect();
    let b: Vec<u8> = (0..1024).map(|i| (255 - i) as u8).collect();

    c.bench_function("gmul_1024", |bencher| {
        bencher.iter(|| {
            let mut acc = 0u8;
            for (x, y) in black_box(&a).iter().zip(black_box(&b).iter()) {
                acc ^= f.gmul(*x, *y);
            }
            black_box(acc)
        });
    });
}

fn bench_row_mul_sub(c: &mut Criterion) {
    let f = field();
    let mut dst: Vec<u8> = (0..1024).map(|i| i as u8).collect();
    let src: Vec<u8> = (0..1024).map(|i| (255 - i) as u8).collect();

    c.bench_function("row_mul_sub_1024", |bencher| {
        bencher.iter(|| {
            f.row_mul_sub(black_box(&mut dst), black_box(&src), 0x07, src.len());
        });
    });
}

criterion_group!(benches, bench_gmul, bench_row_mul_sub);
criterion_main!(benches);
