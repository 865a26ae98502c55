// 该文件是 Yibiao （仪表读数） 项目的一部分。
// tests/pipeline.rs - 读表流水线集成测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Yibiao Authors

#![cfg(feature = "preprocess_opencv")]

mod common;

use common::{FakeError, FakeModel, gauge_photo, slots, upright_needle};
use yibiao::{
  BoundingBox, Calibration, GaugePipelineBuilder, PipelineError, Point, ReadOutcome,
  config::GaugeConfig,
  frame::SourceFrame,
  model::Model,
  reading::TieBreak,
};

#[test]
fn upright_needle_reads_default_scale() {
  let model = FakeModel::new(vec![Ok(upright_needle())]);
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();

  let outcome = pipeline.read(Some(&gauge_photo(1000, 800))).unwrap();
  let reading = outcome.reading().unwrap();

  assert_eq!(reading.value, 9.6);
  assert!((reading.angle_degrees - 90.0).abs() < 1e-9);
  assert_eq!(reading.center, Point::new(500, 400));
  assert_eq!(reading.needle_tip, Point::new(500, 320));
  assert_eq!(
    reading.gauge_box,
    Some(BoundingBox {
      x: 100,
      y: 80,
      width: 800,
      height: 640
    })
  );
  assert_eq!(
    outcome.to_string(),
    "Gauge Reading: 9.6\nAngle: 90.0°\nCenter: (500, 400)\nNeedle Tip: (500, 320)"
  );
  assert_eq!(model.shapes(), vec![[1, 640, 640, 3]]);
}

#[test]
fn missing_image_never_reaches_the_model() {
  let model = FakeModel::default();
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();

  assert!(matches!(pipeline.read(None), Err(PipelineError::NoImage)));
  assert_eq!(model.calls(), 0);
}

#[test]
fn low_confidence_is_reported_as_no_detection() {
  let model = FakeModel::new(vec![Ok(slots(&[
    (0, [0.40, 0.38, 0.60, 0.42], 0.4, 2.0),
    (1, [0.48, 0.48, 0.52, 0.52], 0.95, 0.0),
  ]))]);
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();

  let outcome = pipeline.read(Some(&gauge_photo(100, 100))).unwrap();
  match &outcome {
    ReadOutcome::NoDetection(geometry) => {
      assert_eq!(geometry.center, None);
      assert_eq!(geometry.needle_tip, None);
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert_eq!(outcome.to_string(), "Could not detect gauge reading");
}

#[test]
fn pipeline_stays_usable_after_inference_failure() {
  let model = FakeModel::new(vec![Err(FakeError), Ok(upright_needle())]);
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();
  let image = gauge_photo(1000, 800);

  let err = pipeline.read(Some(&image)).unwrap_err();
  assert!(matches!(err, PipelineError::Inference(_)));
  assert!(!err.is_fatal());

  let outcome = pipeline.read(Some(&image)).unwrap();
  assert_eq!(outcome.reading().map(|r| r.value), Some(9.6));
}

#[test]
fn later_slot_wins_by_default() {
  let entries = [
    (3, [0.10, 0.10, 0.20, 0.20], 0.99, 0.0),
    (5, [0.45, 0.05, 0.55, 0.15], 0.9, 2.0),
    (7, [0.45, 0.45, 0.55, 0.55], 0.5, 0.0),
  ];
  let model = FakeModel::new(vec![Ok(slots(&entries)), Ok(slots(&entries))]);

  let last = GaugePipelineBuilder::new().build(&model).unwrap();
  let outcome = last.read(Some(&gauge_photo(100, 100))).unwrap();
  assert_eq!(outcome.reading().unwrap().center, Point::new(50, 50));

  let config = GaugeConfig::default().with_tie_break(Some(TieBreak::HighestScore));
  let best = GaugePipelineBuilder::new().config(config).build(&model).unwrap();
  let outcome = best.read(Some(&gauge_photo(100, 100))).unwrap();
  assert_eq!(outcome.reading().unwrap().center, Point::new(15, 15));
}

#[test]
fn invalid_configuration_is_fatal() {
  let mut config = GaugeConfig::default();
  config.calibration = Calibration {
    min_angle: 90.0,
    max_angle: 90.0,
    min_value: 0.0,
    max_value: 1.0,
  };
  let err = GaugePipelineBuilder::new()
    .config(config)
    .build(FakeModel::default())
    .err()
    .unwrap();
  assert!(err.is_fatal());
}

#[test]
fn custom_calibration_maps_angle() {
  let mut config = GaugeConfig::default();
  config.calibration = Calibration {
    min_angle: -45.0,
    max_angle: 225.0,
    min_value: 10.0,
    max_value: 0.0,
  };
  let model = FakeModel::new(vec![Ok(upright_needle())]);
  let pipeline = GaugePipelineBuilder::new().config(config).build(&model).unwrap();

  // 90° 位于量程正中
  let outcome = pipeline.read(Some(&gauge_photo(1000, 800))).unwrap();
  assert_eq!(outcome.reading().unwrap().value, 5.0);
}

#[test]
fn pipeline_is_a_model_over_source_frames() {
  let model = FakeModel::new(vec![Ok(upright_needle())]);
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();
  let frame = SourceFrame::new(0, "gauge.png", gauge_photo(1000, 800));

  let outcome = pipeline.infer(&frame).unwrap();
  assert!(outcome.is_detected());
}

#[test]
fn concurrent_reads_share_one_pipeline() {
  const WORKERS: usize = 4;
  const READS: usize = 3;

  let model = FakeModel::new((0..WORKERS * READS).map(|_| Ok(upright_needle())).collect());
  let pipeline = GaugePipelineBuilder::new().build(&model).unwrap();
  let photo = gauge_photo(1000, 800);

  std::thread::scope(|scope| {
    let workers: Vec<_> = (0..WORKERS)
      .map(|_| {
        scope.spawn(|| {
          (0..READS)
            .map(|_| pipeline.read(Some(&photo)).unwrap())
            .collect::<Vec<_>>()
        })
      })
      .collect();

    for worker in workers {
      for outcome in worker.join().unwrap() {
        let reading = outcome.reading().unwrap();
        assert_eq!(reading.value, 9.6);
        assert_eq!(reading.center, Point::new(500, 400));
        assert_eq!(reading.needle_tip, Point::new(500, 320));
      }
    }
  });

  assert_eq!(model.calls(), WORKERS * READS);
  assert!(model.shapes().iter().all(|s| *s == [1, 640, 640, 3]));
}
