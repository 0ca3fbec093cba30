//! Locating a Chromium-family executable to launch.

use std::path::{Path, PathBuf};

fn unix_candidates() -> &'static [&'static str] {
	&[
		"google-chrome-stable",
		"google-chrome",
		"chromium-browser",
		"chromium",
		"brave-browser",
		"brave",
		"/usr/bin/google-chrome-stable",
		"/usr/bin/google-chrome",
		"/usr/bin/chromium-browser",
		"/usr/bin/chromium",
		"/snap/bin/chromium",
	]
}

fn macos_candidates() -> &'static [&'static str] {
	&[
		"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
		"/Applications/Chromium.app/Contents/MacOS/Chromium",
		"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
	]
}

pub(super) fn windows_candidates() -> Vec<PathBuf> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| std::env::var_os(key).map(PathBuf::from))
		.collect();
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];
	let mut candidates: Vec<PathBuf> = roots
		.iter()
		.flat_map(|root| suffixes.iter().map(move |suffix| suffix.iter().fold(root.clone(), |path, part| path.join(part))))
		.collect();
	candidates.extend(["chrome.exe", "msedge.exe", "chromium.exe"].map(PathBuf::from));
	candidates
}

fn resolve(candidate: &Path) -> Option<PathBuf> {
	if candidate.components().count() > 1 {
		candidate.exists().then(|| candidate.to_path_buf())
	} else {
		which::which(candidate).ok()
	}
}

/// First installed Chromium-family browser, searching `PATH` for bare names.
pub(super) fn find_browser() -> Option<PathBuf> {
	let candidates: Vec<PathBuf> = if cfg!(target_os = "macos") {
		macos_candidates().iter().map(PathBuf::from).collect()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		unix_candidates().iter().map(PathBuf::from).collect()
	};
	candidates.iter().find_map(|candidate| resolve(candidate))
}
