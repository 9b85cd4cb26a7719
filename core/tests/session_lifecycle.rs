// core/tests/session_lifecycle.rs
//
// Integration tests for KeyboardSession lifecycle handling.
//
// Tests cover:
// - Pack discovery and the pack tab strip
// - Restoring the active pack (and falling back when it is gone)
// - Layout memoization across pack switches
// - Persisting caches on blur/end and hydrating them on the next start
// - Orphaned compat sweep and directory reset

use ewesticker_core::prefs::keys;
use ewesticker_core::{
    ActivePack, Config, InputTarget, KeyboardSession, MemoryPreferences, PackTab,
    PreferenceStore, StickerError, TomlPreferences, COMPAT_DIR_NAME, RECENT_PACK_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn touch(root: &Path, pack: &str, name: &str) -> PathBuf {
    let dir = root.join(pack);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, b"sticker").unwrap();
    path
}

fn sample_tree(root: &Path) {
    touch(root, "dogs", "1.png");
    touch(root, "dogs", "2.png");
    touch(root, "cats", "b.gif");
    touch(root, "cats", "a.png");
}

fn png_target() -> InputTarget {
    InputTarget::new("org.chat", &["image/png", "image/gif"])
}

#[test]
fn test_pack_tabs_in_alphabetical_order() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let mut config = Config::with_sticker_dir(dir.path());
    config.show_back_button = true;

    let session = KeyboardSession::start(config, MemoryPreferences::new()).unwrap();
    let tabs = session.pack_tabs();
    assert_eq!(tabs[0], PackTab::Back);
    assert_eq!(tabs[1], PackTab::Recent);
    assert_eq!(
        tabs[2],
        PackTab::Pack {
            name: "cats".to_string(),
            thumbnail: dir.path().join("cats/a.png"),
        }
    );
    assert!(matches!(&tabs[3], PackTab::Pack { name, .. } if name == "dogs"));
    assert_eq!(tabs.len(), 4);
}

#[test]
fn test_initial_pack_defaults_to_first_alphabetical() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());

    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::ACTIVE_PACK, "birds");
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();

    let layout = session.activate_initial();
    assert_eq!(session.active_pack(), Some(&ActivePack::Pack("cats".into())));
    assert_eq!(layout.len(), 2);
    assert_eq!(session.context().active_pack, "cats");
}

#[test]
fn test_initial_pack_restores_saved_and_recent() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());

    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::ACTIVE_PACK, "dogs");
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
    session.activate_initial();
    assert_eq!(session.active_pack(), Some(&ActivePack::Pack("dogs".into())));

    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::ACTIVE_PACK, RECENT_PACK_NAME);
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
    session.activate_initial();
    assert_eq!(session.active_pack(), Some(&ActivePack::Recent));
}

#[test]
fn test_no_packs_falls_back_to_recent() {
    let dir = tempfile::tempdir().unwrap();
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), MemoryPreferences::new())
            .unwrap();
    let layout = session.activate_initial();
    assert!(layout.is_empty());
    assert_eq!(session.active_pack(), Some(&ActivePack::Recent));
}

#[test]
fn test_select_pack_memoizes_layout() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), MemoryPreferences::new())
            .unwrap();

    let first = session.select_pack("cats").unwrap();
    session.select_pack("dogs").unwrap();
    let again = session.select_pack("cats").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(session.memo().len(), 2);

    assert!(matches!(
        session.select_pack("birds"),
        Err(StickerError::MissingPack { name }) if name == "birds"
    ));
    // a failed switch keeps the current pack
    assert_eq!(session.active_pack(), Some(&ActivePack::Pack("cats".into())));
}

#[test]
fn test_recent_view_lists_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), MemoryPreferences::new())
            .unwrap();
    session.on_focus(png_target());

    let a = dir.path().join("cats/a.png");
    let one = dir.path().join("dogs/1.png");
    session.tap_and_wait(&a).unwrap();
    session.tap_and_wait(&one).unwrap();

    let recent = session.select_recent();
    let order: Vec<_> = recent.cells.iter().map(|c| c.path.clone()).collect();
    assert_eq!(order, vec![one, a]);
}

#[test]
fn test_blur_persists_and_next_session_hydrates() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let prefs_path = dir.path().join("prefs.toml");

    let sticker = dir.path().join("dogs/2.png");
    {
        let prefs = TomlPreferences::open(&prefs_path).unwrap();
        let mut session =
            KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
        session.activate_initial();
        session.select_pack("dogs").unwrap();
        session.on_focus(png_target());
        session.tap_and_wait(&sticker).unwrap();
        session.on_blur().unwrap();
        assert!(session.target().is_none());
    }

    let prefs = TomlPreferences::open(&prefs_path).unwrap();
    assert_eq!(prefs.get_string(keys::ACTIVE_PACK), Some("dogs"));

    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
    assert_eq!(
        session.recent_cache().to_ordered_list(),
        vec![sticker.to_string_lossy().into_owned()]
    );
    session.activate_initial();
    assert_eq!(session.active_pack(), Some(&ActivePack::Pack("dogs".into())));

    let prefs = session.end().unwrap();
    assert!(prefs.get_string(keys::RECENT_CACHE).is_some());
}

#[test]
fn test_start_sweeps_orphaned_compat_files() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let live = touch(dir.path(), COMPAT_DIR_NAME, "live.png");
    let orphan = touch(dir.path(), COMPAT_DIR_NAME, "orphan.png");

    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::COMPAT_CACHE, "live");
    let session = KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();

    assert!(live.exists());
    assert!(!orphan.exists());
    assert!(!session.packs().contains_key(COMPAT_DIR_NAME));
}

#[test]
fn test_corrupt_cache_string_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::RECENT_CACHE, "\u{1f}\u{1f}");
    let session = KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
    assert!(session.recent_cache().is_empty());
}

#[test]
fn test_long_press_preview_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    let mut session =
        KeyboardSession::start(Config::with_sticker_dir(dir.path()), MemoryPreferences::new())
            .unwrap();
    session.on_focus(png_target());

    let sticker = dir.path().join("cats/b.gif");
    let full = session.metrics().full_icon_size;
    let preview = session.long_press(&sticker).clone();
    assert_eq!(preview.path, sticker);
    assert_eq!(preview.size, full);
    assert!(session.context().commits.is_empty());
    assert!(session.recent_cache().is_empty());

    session.dismiss_preview();
    assert!(session.context().preview.is_none());
}

#[test]
fn test_reset_for_new_directory_clears_caches() {
    let dir = tempfile::tempdir().unwrap();
    sample_tree(dir.path());
    touch(dir.path(), COMPAT_DIR_NAME, "live.png");
    let mut prefs = MemoryPreferences::new();
    prefs.put_string(keys::COMPAT_CACHE, "live");

    let mut session = KeyboardSession::start(Config::with_sticker_dir(dir.path()), prefs).unwrap();
    session.on_focus(png_target());
    session.tap_and_wait(&dir.path().join("cats/a.png")).unwrap();
    session.select_pack("cats").unwrap();
    touch(dir.path(), "birds", "owl.gif");

    let imported = session
        .reset_for_new_directory("content://tree/stickers", "2026-10-19")
        .unwrap();
    assert_eq!(imported, 5);
    assert!(session.pack("birds").is_some());
    assert!(session.memo().is_empty());
    assert!(session.recent_cache().is_empty());
    assert!(session.compat_cache().is_empty());
    assert!(!dir.path().join(COMPAT_DIR_NAME).exists());

    let prefs = session.prefs();
    assert_eq!(prefs.get_string(keys::RECENT_CACHE), Some(""));
    assert_eq!(
        prefs.get_string(keys::STICKER_DIR_PATH),
        Some("content://tree/stickers")
    );
    assert_eq!(prefs.get_string(keys::LAST_UPDATE_DATE), Some("2026-10-19"));
    assert_eq!(prefs.get_int(keys::NUM_STICKERS_IMPORTED), Some(5));
}
