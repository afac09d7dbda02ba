use canonical::{canonicalize, CanonicalizeConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn filing_body(paragraphs: usize) -> String {
    let mut body = String::from("<html><body>");
    for idx in 0..paragraphs {
        body.push_str(&format!(
            "<p>Item {idx}. The Registrant&#8217;s net sales increased 3.5% to $1,{idx:03} million.</p>"
        ));
        if idx % 10 == 0 {
            body.push_str(
                "<table><tr><th>Segment</th><th>2023</th><th>2022</th></tr>\
                 <tr><td>Americas</td><td>1,200</td><td>1,100</td></tr></table>",
            );
        }
    }
    body.push_str("</body></html>");
    body
}

fn bench_canonicalize(c: &mut Criterion) {
    let config = CanonicalizeConfig::default();
    let mut group = c.benchmark_group("canonicalize");

    for paragraphs in [8, 64, 512, 4096].iter() {
        let body = filing_body(*paragraphs);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_function(format!("paragraphs_{paragraphs}"), |b| {
            b.iter(|| {
                canonicalize(black_box("doc-1"), black_box(&body), black_box(&config))
                    .expect("canonicalize")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_canonicalize);
criterion_main!(benches);
