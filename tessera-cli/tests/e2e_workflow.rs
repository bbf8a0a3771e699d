//! End-to-end workflow tests for the tessera CLI.
//!
//! Each test drives the real binary through a multi-step scenario
//! against an isolated data directory.

use assert_cmd::Command;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn tessera(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tessera").unwrap();
    cmd.env("TESSERA_HOME", home).env_remove("RUST_LOG");
    cmd
}

/// Mid-gray photo with gentle texture, safe for deep embedding.
fn write_photo(dir: &Path, name: &str, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_fn(128, 128, |x, y| {
        let t = ((x * 7 + y * 3) % 9) as u8;
        Rgb([120 + t, 124 + t, 118 + t])
    });
    DynamicImage::ImageRgb8(img).save_with_format(&path, format).unwrap();
    path
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success();
    String::from_utf8_lossy(&output.get_output().stdout).into_owned()
}

#[test]
fn test_setup_sign_verify_png() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let photo = write_photo(temp.path(), "photo.png", ImageFormat::Png);

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&home).args(["--quiet", "sign", photo.to_str().unwrap()]).assert().success();

    let tagged = temp.path().join("Tessera_Tagged").join("photo.png");
    assert!(tagged.exists());

    let stdout = stdout_of(tessera(&home).args(["verify", tagged.to_str().unwrap()]));
    assert!(stdout.contains("TRUSTED"), "{stdout}");
    assert!(stdout.contains("Metadata: VALID (Alice)"), "{stdout}");
}

#[test]
fn test_deep_embed_survives_metadata_strip() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let photo = write_photo(temp.path(), "photo.jpg", ImageFormat::Jpeg);

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&home)
        .args(["deep-embed", photo.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tessera_Marked/photo.png"))
        .stdout(predicate::str::contains("Deep Embed Active"));

    let marked = temp.path().join("Tessera_Marked").join("photo.png");
    let stdout = stdout_of(tessera(&home).args(["verify", marked.to_str().unwrap()]));
    assert!(stdout.contains("TRUSTED"), "{stdout}");
    assert!(stdout.contains("Deep Embed: FOUND (Alice)"), "{stdout}");

    // Re-encoding as JPEG drops the PNG text chunk; the mark carries provenance.
    let decoded = image::open(&marked).unwrap();
    let stripped = temp.path().join("stripped.jpg");
    let mut out = fs::File::create(&stripped).unwrap();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(&decoded.to_rgb8())
        .unwrap();
    drop(out);

    let stdout = stdout_of(tessera(&home).args(["verify", stripped.to_str().unwrap()]));
    assert!(stdout.contains("TRUSTED"), "{stdout}");
    assert!(stdout.contains("Metadata: Missing"), "{stdout}");
    assert!(stdout.contains("~"), "approximate timestamp expected: {stdout}");
}

#[test]
fn test_tampered_pixels_fail_verification() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let photo = write_photo(temp.path(), "photo.png", ImageFormat::Png);

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&home).args(["--quiet", "sign", photo.to_str().unwrap()]).assert().success();
    let tagged = temp.path().join("Tessera_Tagged").join("photo.png");

    // Flip one pixel but keep the signature text chunk.
    let bytes = fs::read(&tagged).unwrap();
    let envelope = tessera_core::MetadataChannel::default();
    let signed = match envelope.load(&bytes) {
        tessera_core::EnvelopeLookup::Found(env) => env,
        other => panic!("expected an envelope, got {other:?}"),
    };
    let mut img = image::load_from_memory(&bytes).unwrap().to_rgb8();
    let px = img.get_pixel_mut(10, 10);
    px[0] = px[0].wrapping_add(40);
    let tampered = envelope.store_png(&signed, &DynamicImage::ImageRgb8(img)).unwrap();
    let tampered_path = temp.path().join("tampered.png");
    fs::write(&tampered_path, tampered).unwrap();

    tessera(&home)
        .args(["verify", tampered_path.to_str().unwrap()])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("TAMPERED"))
        .stderr(predicate::str::contains("Verification failed: TAMPERED"));
}

#[test]
fn test_contact_exchange_between_two_users() {
    let temp = TempDir::new().unwrap();
    let alice_home = temp.path().join("alice");
    let bob_home = temp.path().join("bob");
    let photo = write_photo(temp.path(), "photo.png", ImageFormat::Png);

    tessera(&alice_home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&bob_home).args(["--quiet", "setup", "Bob"]).assert().success();
    tessera(&alice_home).args(["--quiet", "sign", photo.to_str().unwrap()]).assert().success();
    let tagged = temp.path().join("Tessera_Tagged").join("photo.png");

    // Bob does not know Alice yet.
    let stdout = stdout_of(tessera(&bob_home).args(["verify", tagged.to_str().unwrap()]));
    assert!(stdout.contains("UNKNOWN_AUTHOR"), "{stdout}");

    let invite = stdout_of(tessera(&alice_home).args(["--quiet", "me"]));
    tessera(&bob_home)
        .args(["add-contact", invite.trim()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Detected invite code for 'Alice'"))
        .stdout(predicate::str::contains("Added Alice to trusted contacts."));

    tessera(&bob_home)
        .arg("contacts")
        .assert()
        .success()
        .stdout(predicate::str::contains("Alice"));

    let stdout = stdout_of(tessera(&bob_home).args(["verify", tagged.to_str().unwrap()]));
    assert!(stdout.contains("TRUSTED"), "{stdout}");
}

#[test]
fn test_add_contact_by_name_and_key() {
    let temp = TempDir::new().unwrap();
    let alice_home = temp.path().join("alice");
    let bob_home = temp.path().join("bob");

    tessera(&alice_home).args(["--quiet", "setup", "Alice"]).assert().success();
    let invite = stdout_of(tessera(&alice_home).args(["--quiet", "me"]));

    use base64::Engine;
    let json = base64::engine::general_purpose::STANDARD.decode(invite.trim()).unwrap();
    let card: serde_json::Value = serde_json::from_slice(&json).unwrap();
    let key = card["key"].as_str().unwrap();

    tessera(&bob_home)
        .args(["add-contact", "Alice From Work", key])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added Alice From Work to trusted contacts."));

    let contacts = fs::read_to_string(bob_home.join("contacts.json")).unwrap();
    assert!(contacts.contains("Alice From Work"));
}

#[test]
fn test_rotate_keeps_old_key_trusted() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let photo = write_photo(temp.path(), "photo.png", ImageFormat::Png);

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&home).args(["--quiet", "sign", photo.to_str().unwrap()]).assert().success();
    let before = fs::read(home.join("identity.pem")).unwrap();

    tessera(&home)
        .args(["rotate", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Identity rotated"))
        .stdout(predicate::str::contains("Alice (Old "));

    assert_ne!(fs::read(home.join("identity.pem")).unwrap(), before);
    assert!(fs::read_dir(home.join("archive_keys")).unwrap().count() >= 2);

    // Images signed with the retired key still verify through contacts.
    let tagged = temp.path().join("Tessera_Tagged").join("photo.png");
    let stdout = stdout_of(tessera(&home).args(["verify", tagged.to_str().unwrap()]));
    assert!(stdout.contains("TRUSTED"), "{stdout}");
    assert!(stdout.contains("Alice (Old "), "{stdout}");
}

#[test]
fn test_rotate_twice_keeps_every_archived_key() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    let first = fs::read_to_string(home.join("identity.pem")).unwrap();
    tessera(&home).args(["--quiet", "rotate", "--yes"]).assert().success();
    let second = fs::read_to_string(home.join("identity.pem")).unwrap();
    tessera(&home).args(["--quiet", "rotate", "--yes"]).assert().success();

    let archived: Vec<String> = fs::read_dir(home.join("archive_keys"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "pem"))
        .map(|path| fs::read_to_string(path).unwrap())
        .collect();
    assert_eq!(archived.len(), 2);
    assert!(archived.contains(&first));
    assert!(archived.contains(&second));
}

#[test]
fn test_batch_embed_folder() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let folder = temp.path().join("shots");
    fs::create_dir(&folder).unwrap();
    write_photo(&folder, "one.png", ImageFormat::Png);
    write_photo(&folder, "two.jpg", ImageFormat::Jpeg);
    fs::write(folder.join("notes.txt"), "not an image").unwrap();

    tessera(&home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&home)
        .args(["batch-embed", folder.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 images."))
        .stdout(predicate::str::contains("Processed 2/2 images."));

    assert!(folder.join("Tessera_Marked").join("one.png").exists());
    assert!(folder.join("Tessera_Marked").join("two.png").exists());
}

#[test]
fn test_verify_without_identity_uses_contacts() {
    let temp = TempDir::new().unwrap();
    let alice_home = temp.path().join("alice");
    let viewer_home = temp.path().join("viewer");
    let photo = write_photo(temp.path(), "photo.png", ImageFormat::Png);

    tessera(&alice_home).args(["--quiet", "setup", "Alice"]).assert().success();
    tessera(&alice_home).args(["--quiet", "sign", photo.to_str().unwrap()]).assert().success();
    let tagged = temp.path().join("Tessera_Tagged").join("photo.png");

    let stdout = stdout_of(tessera(&viewer_home).args(["verify", tagged.to_str().unwrap()]));
    assert!(stdout.contains("UNKNOWN_AUTHOR"), "{stdout}");
}
