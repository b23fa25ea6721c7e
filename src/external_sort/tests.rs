#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use crate::external_sort::{BuildConfig, BuildPipeline};
    use crate::external_sort::constants::*;
    use crate::index::{IndexBuilder, RangeLookup};

    fn test_config(temp: &Path, batch_size: usize) -> BuildConfig {
        BuildConfig {
            batch_size,
            temp_directory: temp.join("scratch"),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = BuildConfig::default();
        assert!(config.validate().is_ok());

        config.io_buffer_size_kb = 1;
        assert!(config.validate().is_err());

        config.io_buffer_size_kb = DEFAULT_IO_BUFFER_SIZE_KB;
        config.record_width = Some(3);
        assert!(config.validate().is_err());

        config.record_width = Some(26);
        config.batch_size = 0;
        config.memory_usage_percent = 95.0;
        assert!(config.validate().is_err());

        config.memory_usage_percent = 20.0;
        assert!(config.validate().is_ok());
        assert!(config.effective_batch_size() >= 1);
    }

    #[test]
    fn test_config_file_roundtrip_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "batch_size": 5000, "record_width": 26 }"#).unwrap();

        let config = BuildConfig::from_file(&path).unwrap();
        assert_eq!(config.batch_size, 5000);
        assert_eq!(config.record_width, Some(26));
        assert!(config.strict_index);

        config.to_file(&path).unwrap();
        let reloaded = BuildConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.batch_size, 5000);
    }

    #[test]
    fn test_scenario_build_and_lookup() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        let sorted = dir.path().join("sorted.csv");
        let index = dir.path().join("index.csv");
        fs::write(&input, "b,v1,0.5\na,v2,0.9\nb,v3,0.2\n").unwrap();

        let pipeline = BuildPipeline::new(test_config(dir.path(), 2)).unwrap();
        let stats = pipeline.run(&input, &sorted, &index).unwrap();

        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.partitions_created, 2);
        assert_eq!(stats.distinct_keys, 2);
        assert_eq!(stats.record_width, 9);

        assert_eq!(fs::read_to_string(&sorted).unwrap(), "a,v2,0.9\nb,v1,0.5\nb,v3,0.2\n");
        assert_eq!(fs::read_to_string(&index).unwrap(), "a,0,0\nb,1,2\n");

        let lookup = RangeLookup::open(&sorted, &index).unwrap();
        assert_eq!(lookup.index_size(), 2);
        assert_eq!(lookup.lookup("b", 0.3).unwrap(), vec![("v1".to_string(), 0.5)]);
    }

    #[test]
    fn test_partitions_removed_after_build() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "c,x,0.1\nb,y,0.2\na,z,0.3\n").unwrap();

        let config = test_config(dir.path(), 1);
        let scratch = config.temp_directory.clone();
        let partitions = config.partition_directory();
        let pipeline = BuildPipeline::new(config).unwrap();
        let stats = pipeline
            .run(&input, &dir.path().join("sorted.csv"), &dir.path().join("index.csv"))
            .unwrap();

        assert_eq!(stats.partitions_created, 3);
        assert_eq!(fs::read_dir(&partitions).unwrap().count(), 0);

        pipeline.cleanup().unwrap();
        assert!(!partitions.exists());
        assert!(scratch.exists());
    }

    #[test]
    fn test_split_failure_cleans_written_partitions() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "a,1,0.1\nb,2,0.2\nc,3,oops\n").unwrap();

        let config = test_config(dir.path(), 1);
        let partitions = config.partition_directory();
        let pipeline = BuildPipeline::new(config).unwrap();
        let result = pipeline.run(&input, &dir.path().join("sorted.csv"), &dir.path().join("index.csv"));

        assert!(matches!(result, Err(crate::SkudexError::MalformedRecord { .. })));
        assert_eq!(fs::read_dir(&partitions).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_partitions_are_not_merged() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "a,1,0.1\n").unwrap();

        let config = test_config(dir.path(), 10);
        fs::create_dir_all(config.partition_directory()).unwrap();
        fs::write(config.partition_directory().join("chunk_7.csv"), "zz,stale,0.9\n").unwrap();

        let sorted = dir.path().join("sorted.csv");
        BuildPipeline::new(config)
            .unwrap()
            .run(&input, &sorted, &dir.path().join("index.csv"))
            .unwrap();

        assert_eq!(fs::read_to_string(&sorted).unwrap(), "a,1,0.1\n");
    }

    #[test]
    fn test_declared_width_mismatch_fails_build() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "a,1,0.1\n").unwrap();

        let mut config = test_config(dir.path(), 10);
        config.record_width = Some(26);
        let result = BuildPipeline::new(config)
            .unwrap()
            .run(&input, &dir.path().join("sorted.csv"), &dir.path().join("index.csv"));

        assert!(matches!(result, Err(crate::SkudexError::ConfigMismatch(_))));
    }

    #[test]
    fn test_foreign_files_in_temp_directory_survive_build() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "b,1,0.1\na,2,0.2\n").unwrap();

        let config = test_config(dir.path(), 1);
        fs::create_dir_all(&config.temp_directory).unwrap();
        let foreign = config.temp_directory.join("chunk_3.csv");
        fs::write(&foreign, "not ours\n").unwrap();

        let pipeline = BuildPipeline::new(config).unwrap();
        pipeline
            .run(&input, &dir.path().join("sorted.csv"), &dir.path().join("index.csv"))
            .unwrap();
        pipeline.cleanup().unwrap();

        assert_eq!(fs::read_to_string(&foreign).unwrap(), "not ours\n");
    }

    #[test]
    fn test_crlf_and_blank_lines_build_lf_records() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        let sorted = dir.path().join("sorted.csv");
        let index = dir.path().join("index.csv");
        fs::write(&input, "b,v1,0.5\r\n\r\na,v2,0.9\r\n\n   \nb,v3,0.2\r\n").unwrap();

        let pipeline = BuildPipeline::new(test_config(dir.path(), 2)).unwrap();
        let stats = pipeline.run(&input, &sorted, &index).unwrap();

        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.record_width, 9);
        assert_eq!(fs::read(&sorted).unwrap(), b"a,v2,0.9\nb,v1,0.5\nb,v3,0.2\n".to_vec());
        assert_eq!(fs::read_to_string(&index).unwrap(), "a,0,0\nb,1,2\n");

        let lookup = RangeLookup::open(&sorted, &index).unwrap();
        assert_eq!(
            lookup.lookup("b", 0.0).unwrap(),
            vec![("v3".to_string(), 0.2), ("v1".to_string(), 0.5)]
        );
    }

    #[test]
    fn test_lenient_pipeline_matches_strict_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "c,v1,0.5\na,v2,0.9\nc,v3,0.2\nb,v4,0.7\na,v5,0.1\n").unwrap();

        let strict_sorted = dir.path().join("strict_sorted.csv");
        let strict_index = dir.path().join("strict_index.csv");
        BuildPipeline::new(test_config(dir.path(), 2))
            .unwrap()
            .run(&input, &strict_sorted, &strict_index)
            .unwrap();

        let mut config = test_config(dir.path(), 2);
        config.strict_index = false;
        let lenient_sorted = dir.path().join("lenient_sorted.csv");
        let lenient_index = dir.path().join("lenient_index.csv");
        let stats = BuildPipeline::new(config)
            .unwrap()
            .run(&input, &lenient_sorted, &lenient_index)
            .unwrap();

        assert_eq!(stats.distinct_keys, 3);
        assert_eq!(fs::read(&strict_sorted).unwrap(), fs::read(&lenient_sorted).unwrap());
        assert_eq!(fs::read(&strict_index).unwrap(), fs::read(&lenient_index).unwrap());
        assert_eq!(fs::read_to_string(&lenient_index).unwrap(), "a,0,1\nb,2,2\nc,3,4\n");
    }

    #[test]
    fn test_lenient_index_over_unsorted_file_keeps_later_run() {
        let dir = tempdir().unwrap();
        let sorted = dir.path().join("sorted.csv");
        let index = dir.path().join("index.csv");
        fs::write(&sorted, "b,v1,0.5\na,v2,0.9\nb,v3,0.2\n").unwrap();

        let layout = IndexBuilder::new(4096)
            .with_strict_order(false)
            .build_index(&sorted, &index)
            .unwrap();
        assert_eq!(layout.key_count, 3);
        assert_eq!(fs::read_to_string(&index).unwrap(), "b,0,0\na,1,1\nb,2,2\n");

        let lookup = RangeLookup::open(&sorted, &index).unwrap();
        assert_eq!(lookup.index_size(), 2);
        assert_eq!(lookup.lookup("b", 0.0).unwrap(), vec![("v3".to_string(), 0.2)]);
    }
}
