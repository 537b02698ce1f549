// Unit tests for domain models

#[cfg(test)]
mod tests {
    use crate::domain::model::*;
    use crate::error::BeatCutError;

    fn clip(id: &str, duration: f64) -> Clip {
        Clip::new(id, format!("/library/{}.mp4", id), duration)
    }

    #[test]
    fn test_track_grid_walks_fixed_period() {
        let track = Track::from_grid("song", None, 10.0, 120.0, 0.25).unwrap();
        assert_eq!(track.beat_grid.first().copied(), Some(0.25));
        assert_eq!(track.beat_grid.len(), 20);
        for pair in track.beat_grid.windows(2) {
            assert!((pair[1] - pair[0] - 0.5).abs() < 1e-9);
        }
        assert!(*track.beat_grid.last().unwrap() < 10.0);
        assert_eq!(track.start_offset, 0.25);
    }

    #[test]
    fn test_track_rejects_non_positive_bpm() {
        let err = Track::from_grid("song", None, 10.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, BeatCutError::NoBeatDetected { .. }));
        assert!(Track::from_grid("song", None, 10.0, -3.0, 0.0).is_err());
        assert!(Track::from_grid("song", None, 10.0, f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_track_start_snaps_to_following_beat() {
        let track = Track::from_grid("song", None, 10.0, 120.0, 0.0)
            .unwrap()
            .with_start_at_or_after(1.2);
        assert_eq!(track.start_offset, 1.5);
    }

    #[test]
    fn test_beat_at_or_before() {
        let track = Track::synthetic(120.0, 10.0).unwrap();
        assert_eq!(track.beat_at_or_before(1.74), Some(1.5));
        assert_eq!(track.beat_at_or_before(2.0), Some(2.0));
        assert_eq!(track.beat_at_or_before(0.0), Some(0.0));
    }

    #[test]
    fn test_beat_at_or_before_grid_start() {
        let track = Track::from_grid("late", None, 10.0, 120.0, 0.3).unwrap();
        assert_eq!(track.beat_at_or_before(0.1), None);
        assert_eq!(track.beat_at_or_before(0.3), Some(0.3));
        assert_eq!(track.first_beat(), 0.3);
    }

    #[test]
    fn test_clip_categories_are_unique() {
        let c = clip("a", 4.0).with_category("city").with_category("city");
        assert_eq!(c.categories, vec!["city".to_string()]);
        assert!(c.has_category("city"));
        assert!(!c.has_category("nature"));
    }

    #[test]
    fn test_clip_can_supply_with_slowdown() {
        let c = clip("a", 1.0);
        assert!(c.can_supply(1.0, 0.95));
        assert!(c.can_supply(1.05, 0.95));
        assert!(!c.can_supply(1.2, 0.95));
    }

    #[test]
    fn test_segment_from_clip_honours_speed() {
        let c = clip("a", 5.0);
        let segment = Segment::from_clip(0, &c, None, 1.0, 2.0, 0.95);
        assert!((segment.span() / segment.speed - segment.duration).abs() < 1e-9);
        assert!((segment.source_out - 2.9).abs() < 1e-9);
    }

    #[test]
    fn test_plan_segment_starts() {
        let c = clip("a", 10.0);
        let plan = EditPlan {
            segments: vec![
                Segment::from_clip(0, &c, None, 0.0, 0.5, 1.0),
                Segment::from_clip(1, &c, None, 0.0, 1.0, 1.0),
                Segment::from_clip(2, &c, None, 0.0, 0.25, 1.0),
            ],
            total_duration: 1.75,
            target_duration: 1.75,
            beat_period: 0.25,
            bpm: 240.0,
            loop_eligible: true,
            repetition_relaxed: false,
            seed: 1,
        };
        assert_eq!(plan.segment_starts(), vec![0.0, 0.5, 1.5]);
        assert!((plan.beats() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_lyric_line_shift_moves_words() {
        let mut line = LyricLine::new(2.0, 4.0, "hello world");
        line.words.push(WordTiming {
            start: 2.5,
            end: Some(3.0),
            text: "world".to_string(),
        });
        let moved = line.shifted(-1.5);
        assert_eq!(moved.start, 0.5);
        assert_eq!(moved.end, 2.5);
        assert_eq!(moved.words[0].start, 1.0);
        assert_eq!(moved.words[0].end, Some(1.5));
    }

    #[test]
    fn test_render_job_ordered_outputs_require_every_segment() {
        let track = Track::synthetic(120.0, 10.0).unwrap();
        let c = clip("a", 10.0);
        let plan = EditPlan {
            segments: vec![
                Segment::from_clip(0, &c, None, 0.0, 1.0, 1.0),
                Segment::from_clip(1, &c, None, 2.0, 1.0, 1.0),
            ],
            total_duration: 2.0,
            target_duration: 2.0,
            beat_period: 0.5,
            bpm: 120.0,
            loop_eligible: true,
            repetition_relaxed: false,
            seed: 1,
        };
        let mut job = RenderJob::new("job", track, plan, "/tmp/work", "/tmp/out.mp4");
        let second = job.segment_path(1);
        job.record_segment(1, second.clone());
        assert!(!job.is_complete());
        assert!(job.ordered_outputs().is_err());

        let first = job.segment_path(0);
        job.record_segment(0, first.clone());
        assert!(job.is_complete());
        assert_eq!(job.ordered_outputs().unwrap(), vec![first, second]);
        assert!(job.segment_path(3).ends_with("seg_0003.mp4"));
    }
}
