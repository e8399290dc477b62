//! Performance benchmarks for expirywatch components.
//!
//! Covers the CPU-bound parts of a run: WHOIS date and response parsing,
//! report rendering and message chunking.

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use expirywatch::collector::Provenance;
use expirywatch::evaluation::{DomainEvaluation, ExpiryStatus};
use expirywatch::notifier::{TELEGRAM_MESSAGE_LIMIT, chunk_message};
use expirywatch::report::format_report;
use expirywatch::whois::{parse_expiry_date, parse_registration_expiry};

/// One value per supported layout, plus one that matches none.
const DATE_VALUES: &[&str] = &[
    "2024-01-02T00:00:00+00:00",
    "2024-01-02T00:00:00Z",
    "2024-01-02 00:00:00 CLST",
    "2024-01-02 00:00:00",
    "2024-01-02",
    "2024.01.02",
    "02-Jan-2024",
    "2024/01/02",
    "the second of January",
];

const REGISTRY_RESPONSE: &str = "Domain Name: EXAMPLE.COM
Registry Domain ID: 2336799_DOMAIN_COM-VRSN
Registrar WHOIS Server: whois.example-registrar.test
Registrar URL: http://www.example-registrar.test
Updated Date: 2024-08-14T07:01:34Z
Creation Date: 1995-08-14T04:00:00Z
Registry Expiry Date: 2025-08-13T04:00:00Z
Registrar: Example Registrar, Inc.
Domain Status: clientDeleteProhibited
Name Server: A.IANA-SERVERS.NET
Name Server: B.IANA-SERVERS.NET
DNSSEC: signedDelegation
";

fn records(count: usize) -> Vec<DomainEvaluation> {
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| DomainEvaluation {
            domain: format!("svc{i}.example.com"),
            namespace: format!("team-{}", i % 7),
            secret: (i % 2 == 0).then(|| format!("svc{i}-tls")),
            ingresses: (0..(i % 3)).map(|n| format!("svc{i}-ing{n}")).collect(),
            provenance: if i % 2 == 0 {
                Provenance::Secret
            } else {
                Provenance::Ingress
            },
            certificate: ExpiryStatus {
                days: (i % 5) as i64,
                expires_at: base + Duration::days((i % 5) as i64),
                in_window: true,
            },
            registration: Some(ExpiryStatus {
                days: 3,
                expires_at: base + Duration::days(3),
                in_window: i % 4 == 0,
            }),
        })
        .collect()
}

fn bench_date_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("whois_parsing");

    group.bench_function("expiry_date_layouts", |b| {
        b.iter(|| {
            for value in DATE_VALUES {
                black_box(parse_expiry_date(black_box(value)));
            }
        })
    });

    group.bench_function("registry_response", |b| {
        b.iter(|| parse_registration_expiry("example.com", black_box(REGISTRY_RESPONSE)))
    });

    group.finish();
}

fn bench_report_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_rendering");
    let generated = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

    for &count in &[10usize, 100, 1000] {
        let all = records(count);
        let (unreachable, soon) = all.split_at(count / 10);
        group.bench_with_input(BenchmarkId::new("format_report", count), &count, |b, _| {
            b.iter(|| format_report(black_box(unreachable), black_box(soon), generated))
        });
    }

    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    let generated = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let report = format_report(&[], &records(500), generated);

    group.throughput(Throughput::Bytes(report.len() as u64));
    group.bench_function("telegram_chunks", |b| {
        b.iter(|| chunk_message(black_box(&report), TELEGRAM_MESSAGE_LIMIT))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_date_parsing,
    bench_report_rendering,
    bench_chunking
);
criterion_main!(benches);
