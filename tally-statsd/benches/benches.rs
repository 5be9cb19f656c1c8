use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tally_statsd::{Flavor, LineEncoder, LineType, MetricId, Statistic};

fn bench_encode(c: &mut Criterion) {
    let id = MetricId::new("http.server.requests")
        .with_tag("method", "GET")
        .with_tag("status", "200")
        .with_tag("uri", "/api/users");

    let mut group = c.benchmark_group("encode");

    for flavor in Flavor::ALL {
        let encoder = LineEncoder::new(flavor);

        group.bench_with_input(BenchmarkId::new("counter", flavor), &id, |b, id| {
            b.iter(|| {
                encoder.encode(
                    black_box(id),
                    Some(Statistic::Count),
                    black_box(42.0),
                    LineType::Counter,
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("bucket", flavor), &id, |b, id| {
            b.iter(|| {
                encoder.encode(
                    black_box(id),
                    Some(Statistic::Bucket(250.0)),
                    black_box(7.0),
                    LineType::Histogram,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
