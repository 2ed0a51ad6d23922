mod common;

use std::cell::RefCell;

use common::{TempImage, IMAGE_SIZE};
use simple_sdfat::io::{BlockDevice, FileDisk, BLOCK_SIZE};
use simple_sdfat::{SdCard, SdConfig, TEST_READ_FILE, TEST_WRITE_CONTENT, TEST_WRITE_FILE};

use test_log::test;

#[test]
fn image_is_rounded_to_whole_blocks() {
    let image = TempImage::new("rounding");
    let mut disk = FileDisk::create(image.path(), 1000).unwrap();

    assert_eq!(disk.block_count().unwrap(), 2);
    assert_eq!(
        std::fs::metadata(image.path()).unwrap().len(),
        2 * BLOCK_SIZE as u64
    );
}

#[test]
fn data_survives_reopening_the_image() {
    let image = TempImage::new("persist");

    {
        let disk = RefCell::new(FileDisk::create(image.path(), IMAGE_SIZE).unwrap());
        let mut sd = SdCard::new(&disk).with_config(SdConfig::default().with_sync_interval(3));

        sd.format().unwrap();
        sd.mount().unwrap();

        sd.write_file(TEST_READ_FILE, b"persisted line\nignored\n")
            .unwrap();
        sd.create_file("empty.bin").unwrap();

        let mut logger = sd.logger("sensor.log").unwrap();
        for sample in 0..10 {
            logger
                .append(format!("sample {}\n", sample).as_bytes())
                .unwrap();
        }
        logger.close().unwrap();
        drop(logger);

        sd.unmount().unwrap();
    }

    let disk = RefCell::new(FileDisk::open(image.path()).unwrap());
    let mut sd = SdCard::new(&disk);
    sd.mount().unwrap();

    assert_eq!(sd.test_read().unwrap(), "persisted line\n");

    let mut names: Vec<_> = sd.scan().unwrap().into_iter().map(|e| e.name).collect();
    names.sort();
    assert_eq!(names, ["empty.bin", "sensor.log", "test.txt"]);

    let log = String::from_utf8(sd.read_file("sensor.log").unwrap()).unwrap();
    assert_eq!(log.lines().count(), 10);
    assert!(log.starts_with("sample 0\n"));
    assert!(log.ends_with("sample 9\n"));

    let stats = sd.stats().unwrap();
    assert!(stats.total_bytes() <= IMAGE_SIZE);
    assert!(stats.free_bytes() < stats.total_bytes());
}

#[test]
fn self_test_against_image() {
    let image = TempImage::new("self-test");
    let disk = RefCell::new(FileDisk::create(image.path(), IMAGE_SIZE).unwrap());
    let mut sd = SdCard::new(&disk);

    sd.format().unwrap();
    sd.mount().unwrap();
    sd.write_file(TEST_READ_FILE, b"hello\n").unwrap();
    sd.unmount().unwrap();

    assert!(sd.self_test().is_empty());

    sd.mount().unwrap();
    assert_eq!(sd.read_file(TEST_WRITE_FILE).unwrap(), TEST_WRITE_CONTENT);
}
