use criterion::{self, criterion_group, criterion_main, Criterion, Throughput};
use xml_cursor::{NodeType, ValueChunk, XmlReader};

/// A document with `items` children, each with attributes, text and a comment
fn document(items: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<feed xmlns=\"urn:feed\" xmlns:m=\"urn:meta\">\n");
    for i in 0..items {
        xml.push_str(&format!(
            "  <item id=\"{0}\" m:rank=\"{1}\"><title>Item &amp; {0}</title>\
             <!-- generated entry {0} --><body><![CDATA[<p>{1}</p>]]></body></item>\n",
            i,
            i * 7 % 13
        ));
    }
    xml.push_str("</feed>\n");
    xml
}

fn read_nodes(c: &mut Criterion) {
    let xml = document(1000);
    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("nodes", |b| {
        b.iter(|| {
            let mut reader = XmlReader::from_str(&xml);
            let mut count = 0;
            while let Some(node) = reader.read().unwrap() {
                if node == NodeType::Element {
                    count += 1;
                }
            }
            assert_eq!(count, 3001, "Overall tag count in generated document");
        })
    });

    group.bench_function("values", |b| {
        b.iter(|| {
            let mut reader = XmlReader::from_str(&xml);
            let mut len = 0;
            while let Some(_) = reader.read().unwrap() {
                len += reader.value().unwrap().len();
                while reader.move_to_next_attribute().unwrap() {
                    len += reader.value().unwrap().len();
                }
            }
            criterion::black_box(len);
        })
    });

    group.bench_function("chunks", |b| {
        let mut buf = String::with_capacity(16);
        b.iter(|| {
            let mut reader = XmlReader::from_str(&xml);
            while let Some(_) = reader.read().unwrap() {
                while let ValueChunk::Read(_) = reader.read_value_chunk(&mut buf, 16).unwrap() {
                    buf.clear();
                }
            }
        })
    });
    group.finish();
}

criterion_group!(benches, read_nodes);
criterion_main!(benches);
