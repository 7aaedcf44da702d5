use scraper::ElementRef;

/// All text below `element`, with surrounding whitespace (including `&nbsp;`) removed.
pub fn trimmed_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// The first text node below `element`, trimmed.
pub fn first_text<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    element.text().next().map(str::trim)
}
