use idp_types::{DocumentFactsInput, RawArticleTitle, RawAuthor, RawDoiWithLang, RawIssn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::XmlError;

/// What the currently-open leaf element's text content should be routed to.
enum TextTarget {
    Year,
    Volume,
    Number,
    Suppl,
    ElocationId,
    Fpage,
    Lpage,
    Collab,
    Surname,
    GivenNames,
    Prefix,
    Suffix,
    Orcid,
    ArticleId { pub_id_type: String, specific_use: String, lang: String },
    Issn { issn_type: String },
    Title { lang: String },
    BodyP,
}

fn attr(e: &BytesStart, local_name: &[u8]) -> String {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local_name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}

/// Extract a `DocumentFactsInput` from one package's raw XML bytes.
///
/// Grounded on `scielo_core/id_provider/xml_sps.py` (`IdRequestArguments`):
/// walks article-ids, issns, doi-with-lang, article-meta issue fields,
/// authors/collab, article-titles and the first non-empty body paragraph,
/// in one forward pass over the document.
pub fn extract(xml: &[u8]) -> Result<DocumentFactsInput, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut input = DocumentFactsInput { xml: xml.to_vec(), ..Default::default() };

    let mut default_lang = String::new();
    let mut have_pub_year = false;
    let mut in_pub_date = false;
    let mut in_body = false;
    let mut body_captured = false;
    let mut current_fpage_seq = String::new();
    let mut current_author: Option<RawAuthor> = None;
    let mut target: Option<TextTarget> = None;
    let mut text_buf = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|_| XmlError::InvalidXml("malformed document".to_string()))? {
            Event::Start(e) | Event::Empty(e) => {
                let local = e.local_name().as_ref().to_vec();
                text_buf.clear();
                match local.as_slice() {
                    b"article" => default_lang = attr(&e, b"lang"),
                    b"pub-date" => in_pub_date = true,
                    b"year" if in_pub_date && !have_pub_year => target = Some(TextTarget::Year),
                    b"volume" => target = Some(TextTarget::Volume),
                    b"issue" => target = Some(TextTarget::Number),
                    b"supplement" => target = Some(TextTarget::Suppl),
                    b"elocation-id" => target = Some(TextTarget::ElocationId),
                    b"fpage" => {
                        current_fpage_seq = attr(&e, b"seq");
                        target = Some(TextTarget::Fpage);
                    }
                    b"lpage" => target = Some(TextTarget::Lpage),
                    b"collab" => target = Some(TextTarget::Collab),
                    b"contrib" if attr(&e, b"contrib-type") == "author" => {
                        current_author = Some(RawAuthor::default());
                    }
                    b"surname" if current_author.is_some() => target = Some(TextTarget::Surname),
                    b"given-names" if current_author.is_some() => target = Some(TextTarget::GivenNames),
                    b"prefix" if current_author.is_some() => target = Some(TextTarget::Prefix),
                    b"suffix" if current_author.is_some() => target = Some(TextTarget::Suffix),
                    b"contrib-id" if current_author.is_some() && attr(&e, b"contrib-id-type") == "orcid" => {
                        target = Some(TextTarget::Orcid)
                    }
                    b"article-id" => {
                        target = Some(TextTarget::ArticleId {
                            pub_id_type: attr(&e, b"pub-id-type"),
                            specific_use: attr(&e, b"specific-use"),
                            lang: attr(&e, b"lang"),
                        })
                    }
                    b"issn" => {
                        let issn_type = {
                            let pub_type = attr(&e, b"pub-type");
                            if pub_type.is_empty() { attr(&e, b"specific-use") } else { pub_type }
                        };
                        target = Some(TextTarget::Issn { issn_type })
                    }
                    b"article-title" => target = Some(TextTarget::Title { lang: default_lang.clone() }),
                    b"trans-title" => target = Some(TextTarget::Title { lang: attr(&e, b"lang") }),
                    b"body" => in_body = true,
                    b"p" if in_body && !body_captured => target = Some(TextTarget::BodyP),
                    _ => {}
                }
            }
            Event::Text(e) => {
                if target.is_some() {
                    text_buf.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::CData(e) => {
                if target.is_some() {
                    text_buf.push_str(&e.decode().unwrap_or_default());
                }
            }
            Event::End(e) => {
                let local = e.local_name().as_ref().to_vec();
                let text = std::mem::take(&mut text_buf);
                if let Some(t) = target.take() {
                    apply(&mut input, t, text, &current_fpage_seq, &mut current_author);
                }
                match local.as_slice() {
                    b"pub-date" => in_pub_date = false,
                    b"year" if !have_pub_year && !input.pub_year.is_empty() => have_pub_year = true,
                    b"contrib" => {
                        if let Some(author) = current_author.take() {
                            input.authors.push(author);
                        }
                    }
                    b"body" => in_body = false,
                    b"p" if in_body && !input.partial_body.is_empty() => body_captured = true,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(input)
}

fn apply(input: &mut DocumentFactsInput, target: TextTarget, text: String, fpage_seq: &str, current_author: &mut Option<RawAuthor>) {
    match target {
        TextTarget::Year => input.pub_year = text,
        TextTarget::Volume => input.volume = text,
        TextTarget::Number => input.number = text,
        TextTarget::Suppl => input.suppl = text,
        TextTarget::ElocationId => input.elocation_id = text,
        TextTarget::Fpage => {
            input.fpage = text;
            input.fpage_seq = fpage_seq.to_string();
        }
        TextTarget::Lpage => input.lpage = text,
        TextTarget::Collab => input.collab = text,
        TextTarget::Surname => {
            if let Some(a) = current_author {
                a.surname = text;
            }
        }
        TextTarget::GivenNames => {
            if let Some(a) = current_author {
                a.given_names = text;
            }
        }
        TextTarget::Prefix => {
            if let Some(a) = current_author {
                a.prefix = text;
            }
        }
        TextTarget::Suffix => {
            if let Some(a) = current_author {
                a.suffix = text;
            }
        }
        TextTarget::Orcid => {
            if let Some(a) = current_author {
                a.orcid = text;
            }
        }
        TextTarget::ArticleId { pub_id_type, specific_use, lang } => match (pub_id_type.as_str(), specific_use.as_str()) {
            ("publisher-id", "scielo-v3") => input.v3 = text,
            ("publisher-id", "scielo-v2") => input.v2 = text,
            ("publisher-id", "previous-pid") => input.aop_pid = text,
            ("doi", _) => input.doi_with_lang.push(RawDoiWithLang { lang, value: text }),
            _ => {}
        },
        TextTarget::Issn { issn_type } => {
            if !issn_type.is_empty() {
                input.issns.push(RawIssn { issn_type, value: text });
            }
        }
        TextTarget::Title { lang } => input.article_titles.push(RawArticleTitle { lang, text }),
        TextTarget::BodyP => {
            if !text.trim().is_empty() {
                input.partial_body = text;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<article xml:lang="en">
        <front>
            <article-meta>
                <article-id pub-id-type="publisher-id" specific-use="scielo-v3">abc</article-id>
                <article-id pub-id-type="publisher-id" specific-use="scielo-v2">S123</article-id>
                <article-id pub-id-type="doi">10.1590/xyz</article-id>
                <issn pub-type="epub">1234-9876</issn>
                <pub-date><year>2022</year></pub-date>
                <volume>44</volume>
                <fpage seq="0">1</fpage>
                <lpage>9</lpage>
                <title-group><article-title>THIS IS A TITLE</article-title></title-group>
                <contrib-group>
                    <contrib contrib-type="author">
                        <name><surname>Silva</surname><given-names>AM</given-names></name>
                        <contrib-id contrib-id-type="orcid">0000-0001</contrib-id>
                    </contrib>
                </contrib-group>
            </article-meta>
        </front>
        <body><p>First paragraph text.</p></body>
    </article>"#;

    #[test]
    fn extracts_identifiers_and_issue_metadata() {
        let input = extract(SAMPLE.as_bytes()).unwrap();
        assert_eq!(input.v3, "abc");
        assert_eq!(input.v2, "S123");
        assert_eq!(input.issns[0].value, "1234-9876");
        assert_eq!(input.pub_year, "2022");
        assert_eq!(input.volume, "44");
        assert_eq!(input.fpage, "1");
        assert_eq!(input.fpage_seq, "0");
        assert_eq!(input.lpage, "9");
        assert_eq!(input.doi_with_lang[0].value, "10.1590/xyz");
        assert_eq!(input.article_titles[0].text, "THIS IS A TITLE");
        assert_eq!(input.partial_body, "First paragraph text.");
    }

    #[test]
    fn extracts_single_author_with_orcid() {
        let input = extract(SAMPLE.as_bytes()).unwrap();
        assert_eq!(input.authors.len(), 1);
        assert_eq!(input.authors[0].surname, "Silva");
        assert_eq!(input.authors[0].orcid, "0000-0001");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(matches!(extract(b"<article><a></b></article>"), Err(XmlError::InvalidXml(_))));
    }
}
