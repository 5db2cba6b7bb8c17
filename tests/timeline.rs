use chartanim::element::{Element, Text};
use chartanim::{
    AnimKind, Animation, AppearStyle, CandleSeries, Ease, OhlcRecord, PlayOpts, PostFxField,
    PostFxTween, RenderConfig, Scene,
};

fn demo_series() -> CandleSeries {
    CandleSeries::from_records(vec![
        OhlcRecord::new(100.0, 105.0, 98.0, 103.0),
        OhlcRecord::new(103.0, 108.0, 102.0, 107.0),
        OhlcRecord::new(107.0, 109.0, 101.0, 102.0),
        OhlcRecord::new(102.0, 112.0, 101.0, 111.0),
    ])
    .unwrap()
}

#[test]
fn story_schedules_groups_back_to_back() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let ids = scene.add_elements(demo_series().candle_elements());

    scene
        .play(vec![Animation::new(AnimKind::CandlesAppear {
            targets: ids.clone(),
            style: AppearStyle::Sequential,
            auto_camera: true,
        })
        .with_duration(2.0)])
        .unwrap();
    scene.wait(0.5).unwrap();
    scene
        .play(vec![Animation::new(AnimKind::FadeOut {
            targets: ids,
            detach: false,
        })
        .with_duration(1.0)])
        .unwrap();

    assert_eq!(scene.total_duration(), 3.5);
    assert_eq!(scene.animations()[0].start_time, 0.0);
    assert_eq!(scene.animations()[1].start_time, 2.5);
}

#[test]
fn candles_reveal_then_fade_away() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let ids = scene.add_elements(demo_series().candle_elements());

    scene
        .play(vec![Animation::new(AnimKind::CandlesAppear {
            targets: ids.clone(),
            style: AppearStyle::All,
            auto_camera: true,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0)])
        .unwrap();
    scene
        .play(vec![Animation::new(AnimKind::FadeOut {
            targets: ids.clone(),
            detach: false,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0)])
        .unwrap();

    scene.update(0.5);
    let mid = scene.element(ids[0]).unwrap().common().opacity;
    assert!(mid > 0.0 && mid < 1.0);

    scene.update(1.0);
    assert_eq!(scene.element(ids[0]).unwrap().common().opacity, 1.0);
    // auto camera framed all four candles
    assert_eq!(scene.camera.view_start, -1.0);
    assert_eq!(scene.camera.view_end, 6.0);

    scene.update(2.0);
    for id in &ids {
        let c = scene.element(*id).unwrap().common();
        assert_eq!(c.opacity, 0.0);
        assert!(!c.visible);
    }
}

#[test]
fn typewriter_reveal_tracks_the_clock() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let id = scene.add_element(Element::Text(Text {
        text: "BREAKOUT".to_string(),
        ..Text::default()
    }));

    scene.wait(1.0).unwrap();
    scene
        .play(vec![Animation::new(AnimKind::TypeText { target: id })
            .with_easing(Ease::Linear)
            .with_duration(1.0)])
        .unwrap();

    scene.update(0.5); // before the animation starts
    scene.update(1.5);
    match scene.element(id).unwrap() {
        Element::Text(t) => assert_eq!(t.visible_text(), "BREA"),
        other => panic!("unexpected {other:?}"),
    }
    scene.update(2.5);
    match scene.element(id).unwrap() {
        Element::Text(t) => assert_eq!(t.visible_text(), "BREAKOUT"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn staggered_play_delays_each_member() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let a = scene.add_element(Element::Text(Text::default()));
    let b = scene.add_element(Element::Text(Text::default()));

    scene
        .play_with(
            vec![
                Animation::new(AnimKind::FadeIn { targets: vec![a] }).with_duration(1.0),
                Animation::new(AnimKind::FadeIn { targets: vec![b] }).with_duration(1.0),
            ],
            PlayOpts {
                duration: None,
                delay: 0.5,
            },
        )
        .unwrap();

    assert_eq!(scene.animations()[1].start_time, 0.5);
    assert_eq!(scene.total_duration(), 1.5);

    scene.update(0.4);
    assert!(scene.element(a).unwrap().common().opacity > 0.0);
    assert_eq!(scene.element(b).unwrap().common().opacity, 1.0); // untouched default
    scene.update(0.6);
    assert!(scene.element(b).unwrap().common().opacity < 1.0); // fade has begun
}

#[test]
fn overlapping_groups_share_the_previous_start() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let ids = scene.add_elements(demo_series().candle_elements());
    let txt = scene.add_element(Element::Text(Text {
        text: "entry".to_string(),
        ..Text::default()
    }));

    scene
        .play(vec![Animation::new(AnimKind::CandlesAppear {
            targets: ids,
            style: AppearStyle::Cascade,
            auto_camera: false,
        })
        .with_duration(2.0)])
        .unwrap();
    scene
        .play_with_previous(
            vec![Animation::new(AnimKind::FadeIn { targets: vec![txt] }).with_duration(0.5)],
            0.8,
        )
        .unwrap();

    assert_eq!(scene.animations()[1].start_time, 0.8);
    assert_eq!(scene.total_duration(), 2.0);
}

#[test]
fn postfx_tween_drives_the_scene_config() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    scene
        .play(vec![Animation::new(AnimKind::TweenPostFx {
            tweens: vec![PostFxTween {
                field: PostFxField::BloomIntensity,
                from: 0.0,
                to: 0.4,
            }],
        })
        .with_easing(Ease::Linear)
        .with_duration(2.0)])
        .unwrap();

    scene.update(1.0);
    assert!((scene.config.post.get(PostFxField::BloomIntensity) - 0.2).abs() < 1e-9);
    scene.update(2.0);
    assert_eq!(scene.config.post.get(PostFxField::BloomIntensity), 0.4);
}

#[test]
fn zoom_then_flash_leaves_a_consistent_end_state() {
    let mut scene = Scene::new(RenderConfig::default()).unwrap();
    let ids = scene.add_elements(demo_series().candle_elements());

    scene
        .play(vec![Animation::new(AnimKind::CandlesAppear {
            targets: ids.clone(),
            style: AppearStyle::All,
            auto_camera: true,
        })
        .with_duration(1.0)])
        .unwrap();
    scene
        .play(vec![Animation::new(AnimKind::ZoomTo {
            start_index: 1,
            end_index: 2,
            padding: 0.1,
            from: None,
            to: None,
        })
        .with_duration(1.0)])
        .unwrap();
    scene
        .play(vec![Animation::new(AnimKind::FlashCandle {
            target: ids[2],
            color: chartanim::Rgba::from_hex("#FFD54F"),
            cycles: 2,
            original: None,
        })
        .with_duration(1.0)])
        .unwrap();

    scene.update(3.0);
    assert_eq!(scene.camera.view_start, 0.0);
    assert_eq!(scene.camera.view_end, 5.0);
    match scene.element(ids[2]).unwrap() {
        Element::Candle(c) => {
            assert_eq!(c.bull_color, None, "flash must restore the theme color");
            assert_eq!(c.bear_color, None);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn speed_multiplier_compresses_the_whole_timeline() {
    let build = |speed: f64| {
        let mut scene = Scene::new(RenderConfig {
            speed_multiplier: speed,
            ..RenderConfig::default()
        })
        .unwrap();
        let ids = scene.add_elements(demo_series().candle_elements());
        scene
            .play(vec![Animation::new(AnimKind::CandlesAppear {
                targets: ids,
                style: AppearStyle::All,
                auto_camera: false,
            })
            .with_duration(2.0)])
            .unwrap();
        scene.wait(1.0).unwrap();
        scene.total_duration()
    };

    assert_eq!(build(1.0), 3.0);
    assert_eq!(build(2.0), 1.5);
}
