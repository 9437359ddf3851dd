use promptdeck::get_system_info;
use promptdeck::system_info::SystemInfo;

#[test]
fn test_system_info_names_crate_and_profile() {
    let info = SystemInfo::current();
    assert_eq!(info.name, "promptdeck");
    assert!(!info.commit.is_empty());
    assert!(info.profile == "dev" || info.profile == "release");

    let summary = get_system_info();
    assert!(summary.contains(info.commit));
    assert!(summary.contains(&info.version));
}
