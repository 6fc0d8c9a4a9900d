use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::classify::classify;
use inference::processing::YoloPostProcessor;
use inference::rank::rank;
use inference::{BoundingBox, RawDetection};
use ndarray::{Array, IxDyn};
use preprocess::LetterboxTransform;

fn create_raw_detections(n: usize) -> Vec<RawDetection> {
    (0..n)
        .map(|i| {
            let x = (i * 37 % 1800) as f64;
            let y = (i * 53 % 1000) as f64;
            let side = 20.0 + (i % 9) as f64 * 30.0;
            RawDetection {
                raw_label: if i % 4 == 0 { "D00" } else { "pothole" }.to_string(),
                confidence: 0.15 + (i * 13 % 85) as f64 / 100.0,
                bbox: BoundingBox::new(x, y, x + side, y + side),
            }
        })
        .collect()
}

/// YOLOv8 head `[1, 5, anchors]` with `hits` confident, non-overlapping boxes.
fn create_mock_yolo_output(anchors: usize, hits: usize) -> Array<f32, IxDyn> {
    let mut out = Array::zeros(IxDyn(&[1, 5, anchors]));
    for i in 0..hits.min(anchors) {
        out[[0, 0, i]] = 20.0 + (i % 20) as f32 * 30.0;
        out[[0, 1, i]] = 20.0 + (i / 20) as f32 * 30.0;
        out[[0, 2, i]] = 20.0;
        out[[0, 3, i]] = 20.0;
        out[[0, 4, i]] = 0.9;
    }
    out
}

fn benchmark_classify_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_rank");

    for n in [1, 10, 50, 300] {
        let raw = create_raw_detections(n);
        group.bench_with_input(BenchmarkId::new("classify_rank", n), &raw, |b, raw| {
            b.iter(|| {
                let classified = raw
                    .iter()
                    .map(|r| classify(black_box(r), 1920, 1080))
                    .collect();
                rank(classified)
            });
        });
    }

    group.finish();
}

fn benchmark_yolo_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    let post = YoloPostProcessor::new(0.7, 300);
    let names = vec!["pothole".to_string()];
    let transform = LetterboxTransform {
        orig_width: 1920,
        orig_height: 1080,
        scale: 1.0 / 3.0,
        offset_x: 0.0,
        offset_y: 140.0,
    };

    for hits in [0, 5, 50, 200] {
        let output = create_mock_yolo_output(8400, hits);
        group.bench_with_input(BenchmarkId::new("yolo_decode", hits), &output, |b, output| {
            b.iter(|| {
                post.decode(black_box(&output.view()), &transform, &names, 0.15)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_classify_and_rank, benchmark_yolo_decode);
criterion_main!(benches);
