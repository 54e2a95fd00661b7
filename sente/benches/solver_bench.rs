use criterion::{Criterion, black_box, criterion_group, criterion_main};
use goban::board::{Board, Loc, Player};
use goban::rules::BasicRule;
use sente::vcf::VcfSolver;

fn ladder_position() -> Board {
    let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
    let black = [(7, 7), (7, 8), (7, 9), (5, 5), (6, 6), (4, 9), (5, 9)];
    let white = [(7, 6), (0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)];
    for &(x, y) in &black {
        board.set_stone(Loc::from_xy(x, y, 15), Player::Black).unwrap();
    }
    for &(x, y) in &white {
        board.set_stone(Loc::from_xy(x, y, 15), Player::White).unwrap();
    }
    board
}

fn bench_vcf(c: &mut Criterion) {
    let board = ladder_position();
    c.bench_function("vcf_forced_sequence", |b| {
        b.iter(|| {
            let mut solver = VcfSolver::new(black_box(&board), Player::Black, 50_000);
            black_box(solver.solve())
        })
    });
}

fn bench_priority_scan(c: &mut Criterion) {
    let board = ladder_position();
    c.bench_function("move_priority_full_board", |b| {
        b.iter(|| {
            let mut count = 0;
            for loc in board.locs() {
                if board.get_move_priority(Player::Black, black_box(loc))
                    == goban::board::MovePriority::Normal
                {
                    count += 1;
                }
            }
            black_box(count)
        })
    });
}

criterion_group!(benches, bench_vcf, bench_priority_scan);
criterion_main!(benches);
