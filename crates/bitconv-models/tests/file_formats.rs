//! Load → convolve → write round trip through real files

use bitconv_models::{
    load_image, write_output, Kernel, ModelError, ReferenceConvolver, Shape,
};
use std::io::Write;
use tempfile::TempDir;

fn write_input(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    path
}

#[test]
fn constant_image_file_produces_expected_output_file() {
    let dir = TempDir::new().unwrap();

    let mut text = String::from("9 9 1\n");
    for _ in 0..9 {
        text.push_str(&["10"; 9].join(" "));
        text.push('\n');
    }
    let input = write_input(&dir, "input_x.txt", &text);

    let image = load_image(&input).unwrap();
    assert_eq!(image.shape(), Shape::new(9, 9, 1));

    let out = ReferenceConvolver::new(Kernel::CENTER_WEIGHTED)
        .unwrap()
        .convolve(&image)
        .unwrap();

    let output = dir.path().join("output_fpga.txt");
    write_output(&output, &out).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("5 5 1"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 5);
    for row in rows {
        assert_eq!(row, "450  450  450  450  450 ");
    }
}

#[test]
fn rgb_file_round_trips_shape() {
    let dir = TempDir::new().unwrap();
    let mut text = String::from("6 7 3\n");
    for r in 0..6u32 {
        let row: Vec<String> = (0..7 * 3).map(|i| ((r * 31 + i) % 256).to_string()).collect();
        text.push_str(&row.join(" "));
        text.push('\n');
    }
    let image = load_image(write_input(&dir, "rgb.txt", &text)).unwrap();
    let out = ReferenceConvolver::new(Kernel::CENTER_WEIGHTED)
        .unwrap()
        .convolve(&image)
        .unwrap();
    assert_eq!(out.shape(), Shape::new(2, 3, 3));

    let path = dir.path().join("out.txt");
    write_output(&path, &out).unwrap();
    let written = std::fs::read_to_string(path).unwrap();
    let body: Vec<u16> = written
        .lines()
        .skip(1)
        .flat_map(|l| l.split_whitespace().map(|t| t.parse::<u16>().unwrap()))
        .collect();
    assert_eq!(body, out.as_slice());
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = load_image(dir.path().join("nope.txt")).unwrap_err();
    assert!(matches!(err, ModelError::FileNotFound { .. }));
}

#[test]
fn bad_token_in_file_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "bad.txt", "5 5 1\n1 1 1 1 1 1 1 -3 1 1");
    assert!(matches!(
        load_image(path),
        Err(ModelError::InvalidSample { row: 1, col: 2, channel: 0, .. })
    ));
}
