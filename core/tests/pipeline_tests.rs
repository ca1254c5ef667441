use retrieval::persist::{load_index, open_for_build, save_index, IndexPaths};
use retrieval::run::search_run;
use retrieval::{BuildMode, CorpusParser, Field, InvertedIndex, QueryEvaluator, SearchConfig};
use std::fs;
use tempfile::tempdir;

const CORPUS: &str = "\
.I 1
.T
experimental investigation of the aerodynamics of a
wing in a slipstream .
.A
brenckman,m.
.B
j. ae. scs. 25, 1958, 324.
.W
experimental investigation of the aerodynamics of a
wing in a slipstream .
  an experimental study of a wing in a propeller slipstream was
made in order to determine the spanwise distribution of the lift
increase due to slipstream at different angles of attack of the wing
.I 2
.T
simple shear flow past a flat plate in an incompressible fluid of small
viscosity .
.A
ting-yili
.B
department of aeronautical engineering, rensselaer polytechnic
institute
troy, n.y.
.W
simple shear flow past a flat plate in an incompressible fluid of small
viscosity .
in the study of high-speed viscous flow past a two-dimensional body it
is usually necessary to consider a curved shock wave emitting from the
nose or leading edge of the body .
.I 3
.T
the boundary layer in simple shear flow past a flat plate .
.A
m. b. glauert
.B
department of mathematics, university of manchester, manchester,
england
.W
the boundary layer in simple shear flow past a flat plate .
the boundary-layer equations are presented for steady
incompressible flow with no pressure gradient .
";

const QUERIES: &str = "\
.I 001
.W
what similarity laws must be obeyed when constructing aeroelastic models
of heated high speed aircraft .
.I 002
.W
what are the structural and aeroelastic problems associated with flight
of high speed aircraft .
.I 004
.W
what problems of heat conduction in composite slabs have been solved so
far .
.I 008
.W
can a criterion be developed to show empirically the validity of flow
solutions for chemically reacting gas mixtures based on the simplifying
assumption of instantaneous local chemical equilibrium .
.I 009
.W
what chemical kinetic system is applicable to hypersonic aerodynamic
problems .
.I 010
.W
boundary layer in shear flow past a flat plate
";

fn build(dir: &std::path::Path) -> InvertedIndex {
    let paths = IndexPaths::new(dir);
    let mut index = open_for_build(&paths, BuildMode::Create, Default::default()).unwrap();
    index.build(CorpusParser::new(CORPUS.as_bytes()), BuildMode::Create).unwrap();
    save_index(&paths, &index).unwrap();
    index
}

#[test]
fn run_file_is_well_formed_for_every_model() {
    let dir = tempdir().unwrap();
    build(dir.path());
    let index = load_index(&IndexPaths::new(dir.path())).unwrap();

    for similarity in 0..5 {
        let config = SearchConfig { similarity, ..Default::default() };
        let mut out = Vec::new();
        let report = search_run(&index, &config, QUERIES.as_bytes(), &mut out).unwrap();
        assert_eq!(report.queries, 6);

        let text = String::from_utf8(out).unwrap();
        let mut last: Option<(usize, usize)> = None;
        for line in text.lines() {
            let cols: Vec<&str> = line.split(' ').collect();
            assert_eq!(cols.len(), 6, "{line}");
            assert_eq!(cols[1], "0");
            assert_eq!(cols[5], "Any");
            let q: usize = cols[0].parse().unwrap();
            let rank: usize = cols[3].parse().unwrap();
            let score: f32 = cols[4].parse().unwrap();
            assert!(score.is_finite());
            match last {
                Some((lq, lr)) if lq == q => assert_eq!(rank, lr + 1),
                Some((lq, _)) => {
                    assert!(q > lq);
                    assert_eq!(rank, 1);
                }
                None => assert_eq!(rank, 1),
            }
            last = Some((q, rank));
        }
        let q6: Vec<&str> = text.lines().filter(|l| l.starts_with("6 ")).collect();
        assert_eq!(q6.first().map(|l| l.split(' ').nth(2).unwrap()), Some("3"), "model {similarity}");
    }
}

#[test]
fn update_mode_replaces_a_stored_document() {
    let dir = tempdir().unwrap();
    let original = build(dir.path());
    let paths = IndexPaths::new(dir.path());

    let mut index = open_for_build(&paths, BuildMode::Update, Default::default()).unwrap();
    let revision = ".I 2\n.T\nhypersonic chemical kinetics\n.W\nreacting gas mixtures\n";
    let report = index.build(CorpusParser::new(revision.as_bytes()), BuildMode::Update).unwrap();
    assert_eq!(report.replaced, 1);
    save_index(&paths, &index).unwrap();

    let reloaded = load_index(&paths).unwrap();
    assert_eq!(reloaded.document_count(), original.document_count());
    let doc2 = reloaded.doc_id("2").unwrap();
    assert!(reloaded.postings(Field::Title, "viscosity").is_empty());
    assert_eq!(reloaded.postings(Field::Words, "gas").iter().filter(|p| p.doc_id == doc2).count(), 1);
    assert!(reloaded.postings(Field::Author, "ting").is_empty());

    let evaluator = QueryEvaluator::new(&reloaded, &SearchConfig::default()).unwrap();
    assert_eq!(evaluator.evaluate("hypersonic kinetics")[0].external_id, "2");
}

#[test]
fn corpus_file_on_disk_parses_like_memory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cran.all.1400");
    fs::write(&path, CORPUS).unwrap();
    let file = std::io::BufReader::new(fs::File::open(&path).unwrap());
    let ids: Vec<String> = CorpusParser::new(file).map(|d| d.unwrap().id().to_string()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}
