// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.

//! Short-message extraction.

use unicode_general_category::{get_general_category, GeneralCategory};

use std::borrow::Cow;

/// Extract a short title from a raw log message.
///
/// The message is trimmed, cut at the first carriage return, newline or tab (a multi-line
/// message always titles as its first line, whatever its length), and returned unchanged if at
/// most `max` characters remain. Otherwise the cut point backs up from `max` toward `min`
/// looking for a separator or punctuation boundary, then sheds any trailing
/// space/dash/quote/bracket so the title ends on a word -- keeping `!`, `?`, `⁈` and `;`
/// attached to it -- and an ellipsis is appended.
///
/// Returns `Cow::Borrowed` when no length truncation happened.
pub(crate) fn truncate(s: &str, max: usize, min: usize) -> Cow<'_, str> {
    let mut s = s.trim();
    if let Some(i) = s.find(['\r', '\n', '\t']) {
        if i > 0 {
            s = &s[..i];
        }
    }

    let runes: Vec<char> = s.chars().collect();
    if runes.len() <= max {
        return Cow::Borrowed(s);
    }

    // back up to the first space or punctuation
    let mut cut = max;
    for i in (min..max).rev() {
        if is_boundary(runes[i]) {
            break;
        }
        cut = i;
    }

    // then past any trailing spaces or punctuation
    for i in (min..cut).rev() {
        let r = runes[i];
        if matches!(r, '!' | '?' | '⁈' | ';') || !is_trailing(r) {
            break;
        }
        cut = i;
    }

    let mut title: String = runes[..cut].iter().collect();
    title.push('…');
    Cow::Owned(title)
}

// Unicode classes Z, Pd, Pe, Pf, Po.
fn is_boundary(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::SpaceSeparator
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
            | GeneralCategory::DashPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
    )
}

// Unicode classes Z, Pd, Pi, Ps, Po.
fn is_trailing(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::SpaceSeparator
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
            | GeneralCategory::DashPunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::OtherPunctuation
    )
}
