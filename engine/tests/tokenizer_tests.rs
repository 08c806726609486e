use engine::{Analyzer, Language, Tokenizer, TokenizerKind};

fn terms(text: &str) -> Vec<String> {
    Analyzer::default().analyze(text).map(|(_, t)| t.as_str().to_string()).collect()
}

#[test]
fn it_normalizes_and_stems() {
    let words = terms("Running Runners RUN! The ﬁle menu.");
    assert!(words.contains(&"run".to_string()));
    // NFKC folds the ligature before stemming
    assert!(words.contains(&"file".to_string()));
}

#[test]
fn it_keeps_stopwords() {
    let words = terms("The quick brown fox and the lazy dog");
    assert_eq!(words.iter().filter(|w| *w == "the").count(), 2);
    assert!(words.contains(&"and".to_string()));
}

#[test]
fn analyzer_is_deterministic() {
    let analyzer = Analyzer::new(TokenizerKind::Bias, Language::English);
    let text = "\"Well-known\" U.S.A. facts -- e-mail bob@example.com.";
    let first: Vec<_> = analyzer.analyze(text).collect();
    let second: Vec<_> = analyzer.analyze(text).collect();
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.0 == b.0 && a.1 == b.1));
}

#[test]
fn offsets_point_back_into_the_text() {
    let text = "alpha, beta; gamma";
    for token in Tokenizer::new(TokenizerKind::Character).tokenize(text) {
        assert_eq!(&text[token.start()..token.end()], token.value());
    }
}
