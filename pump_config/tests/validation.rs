use pump_config::load_toml;
use rstest::rstest;

const BASE: &str = r#"
[pins]
motor_step = 23
motor_dir = 24
motor_en = 25

[calibration]
factor = 2.5
default_syringe_ml = 10

[[calibration.syringes]]
size_ml = 10
steps_per_ml = 303

[[calibration.syringes]]
size_ml = 15
steps_per_ml = 265

[[calibration.syringes]]
size_ml = 20
steps_per_ml = 168

[motion]
retract_sps = 400.0
min_sps = 0.0001
pause_poll_ms = 50
"#;

fn with_override(section_edit: (&str, &str)) -> String {
    BASE.replacen(section_edit.0, section_edit.1, 1)
}

#[test]
fn accepts_full_config() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.calibration.syringes.len(), 3);
    assert_eq!(cfg.calibration.syringes[2].size_ml, 20);
}

#[rstest]
#[case(("factor = 2.5", "factor = 0.0"), "calibration.factor")]
#[case(("factor = 2.5", "factor = -1.0"), "calibration.factor")]
#[case(("default_syringe_ml = 10", "default_syringe_ml = 50"), "default_syringe_ml = 50")]
#[case(("steps_per_ml = 265", "steps_per_ml = 0"), "steps_per_ml")]
#[case(("size_ml = 15", "size_ml = 10"), "duplicate syringe size 10")]
#[case(("retract_sps = 400.0", "retract_sps = 0.0"), "motion.retract_sps")]
#[case(("min_sps = 0.0001", "min_sps = 0.0"), "motion.min_sps")]
#[case(("pause_poll_ms = 50", "pause_poll_ms = 0"), "pause_poll_ms")]
#[case(("pause_poll_ms = 50", "pause_poll_ms = 5000"), "pause_poll_ms")]
#[case(("motor_dir = 24", "motor_dir = 23"), "must differ")]
#[case(("motor_en = 25", "motor_en = 24"), "motor_en must differ")]
fn rejects_invalid_values(#[case] edit: (&str, &str), #[case] needle: &str) {
    let cfg = load_toml(&with_override(edit)).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error {err} should mention {needle}"
    );
}

#[test]
fn rejects_unknown_rotation() {
    let toml = format!("{BASE}\n[logging]\nrotation = \"weekly\"\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("weekly rotation is unsupported");
    assert!(format!("{err}").contains("logging.rotation"));
}

#[test]
fn rejects_empty_syringe_table() {
    let toml = r#"
[calibration]
factor = 1.0
default_syringe_ml = 10
syringes = []
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("empty table must fail");
    assert!(format!("{err}").contains("at least one syringe"));
}

#[test]
fn unknown_keys_type_errors_fail_parse() {
    let toml = r#"
[motion]
pause_poll_ms = "fast"
"#;
    assert!(load_toml(toml).is_err());
}
